use async_trait::async_trait;

/// Expands a submitted link into the image URLs it refers to.
///
/// Host-specific implementations (album and gallery scrapers) live outside
/// this crate; they register in a [`ResolverTable`] and the thumbnail
/// pipeline itself only ever sees a single resolved URL.
#[async_trait]
pub trait SourceResolver: Send + Sync {
    /// Whether this resolver claims the given URL.
    fn matches(&self, url: &str) -> bool;

    /// Candidate image URLs derived from the link.
    async fn resolve(&self, url: &str) -> Vec<String>;
}

/// Registered `{matcher, resolver}` pairs, consulted in registration order.
#[derive(Default)]
pub struct ResolverTable {
    resolvers: Vec<Box<dyn SourceResolver>>,
}

impl ResolverTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, resolver: Box<dyn SourceResolver>) {
        self.resolvers.push(resolver);
    }

    /// Resolves a submitted URL. The first matching resolver wins; a URL no
    /// resolver claims passes through as its own single candidate.
    pub async fn resolve(&self, url: &str) -> Vec<String> {
        for resolver in &self.resolvers {
            if resolver.matches(url) {
                return resolver.resolve(url).await;
            }
        }
        vec![url.to_string()]
    }
}
