use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use axum::http::HeaderValue;
use tower_http::cors::{AllowOrigin, CorsLayer};

/// The two localhost origin forms recognized for `port`: hostname and
/// loopback literal, matching the two ways a browser tab might be served.
fn static_origins(port: u16) -> Vec<String> {
    vec![format!("http://localhost:{port}"), format!("http://127.0.0.1:{port}")]
}

/// Origins allowed beyond the static localhost pair — the tunnel's public
/// URL, added when the tunnel starts and removed when it stops.
#[derive(Clone)]
pub struct DynamicOrigins {
    static_set: HashSet<String>,
    dynamic: Arc<RwLock<HashSet<String>>>,
}

impl DynamicOrigins {
    pub fn new(port: u16) -> Self {
        Self { static_set: static_origins(port).into_iter().collect(), dynamic: Arc::new(RwLock::new(HashSet::new())) }
    }

    pub fn add(&self, origin: String) {
        self.dynamic.write().expect("cors origin set poisoned").insert(origin);
    }

    pub fn remove(&self, origin: &str) {
        self.dynamic.write().expect("cors origin set poisoned").remove(origin);
    }

    fn contains(&self, origin: &str) -> bool {
        self.static_set.contains(origin) || self.dynamic.read().expect("cors origin set poisoned").contains(origin)
    }

    pub fn layer(&self) -> CorsLayer {
        let origins = self.clone();
        CorsLayer::new()
            .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _parts: &axum::http::request::Parts| {
                origin.to_str().is_ok_and(|s| origins.contains(s))
            }))
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn localhost_origins_for_the_bound_port_are_always_allowed() {
        let origins = DynamicOrigins::new(38123);
        assert!(origins.contains("http://localhost:38123"));
        assert!(origins.contains("http://127.0.0.1:38123"));
    }

    #[test]
    fn tunnel_url_is_allowed_after_add_and_rejected_after_remove() {
        let origins = DynamicOrigins::new(38123);
        let tunnel = "https://abc123.trycloudflare.com".to_string();
        assert!(!origins.contains(&tunnel));
        origins.add(tunnel.clone());
        assert!(origins.contains(&tunnel));
        origins.remove(&tunnel);
        assert!(!origins.contains(&tunnel));
    }
}
