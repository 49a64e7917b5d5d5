//! Remote retrieval of dataset bytes

use reqwest::blocking::Client;

use crate::error::{MixtapeError, Result};

/// User agent sent with every request
pub const USER_AGENT: &str = concat!("mixtape-data/", env!("CARGO_PKG_VERSION"));

/// Source of raw dataset bytes
pub trait Fetcher {
    /// GET `url` and return the full response body
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

impl<F: Fetcher + ?Sized> Fetcher for &F {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        (**self).fetch(url)
    }
}

/// Blocking HTTP fetcher. Redirects are followed (GitHub `raw` URLs redirect
/// to `raw.githubusercontent.com`).
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(MixtapeError::Client)?;
        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let fetch_err = |source| MixtapeError::Fetch {
            url: url.to_string(),
            source,
        };

        let response = self.client.get(url).send().map_err(fetch_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(MixtapeError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().map_err(fetch_err)?;
        tracing::debug!(url, bytes = body.len(), "Fetched dataset");
        Ok(body.to_vec())
    }
}
