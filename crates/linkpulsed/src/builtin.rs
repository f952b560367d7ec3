//! Built-in endpoint list, used when neither the config file nor the
//! command line names any endpoints.

use linkpulse_core::Endpoint;

pub const DEFAULT_ENDPOINTS: &[&str] = &[
    "http://google.com",
    "http://takis.gr",
    "http://facebook.com",
    "http://stackoverflow.com",
    "http://golang.org",
    "http://amazon.com",
];

pub fn endpoints() -> Vec<Endpoint> {
    DEFAULT_ENDPOINTS.iter().map(|e| Endpoint::new(e)).collect()
}
