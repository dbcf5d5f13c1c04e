use flate2::read::GzDecoder;
use reqwest::blocking::{Client, ClientBuilder};
use reqwest::redirect::Policy;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::FetchError;
use crate::source::{Transport, Unpacker};

pub const MAX_REDIRECTS: usize = 5;

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, FetchError> {
        Self::from_builder(Self::builder())
    }

    /// Client settings every transport shares: at most [`MAX_REDIRECTS`]
    /// redirects and no wall-clock timeout.
    pub fn builder() -> ClientBuilder {
        Client::builder()
            .redirect(Policy::limited(MAX_REDIRECTS))
            .user_agent(concat!("link-stdlib/", env!("CARGO_PKG_VERSION")))
            .timeout(None::<std::time::Duration>)
    }

    pub fn from_builder(builder: ClientBuilder) -> Result<Self, FetchError> {
        let client = builder.build().map_err(|source| FetchError::Transport {
            url: String::new(),
            source,
        })?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let wrap = |source: reqwest::Error| {
            if source.is_redirect() {
                FetchError::TooManyRedirects {
                    url: url.to_string(),
                    limit: MAX_REDIRECTS,
                }
            } else {
                FetchError::Transport {
                    url: url.to_string(),
                    source,
                }
            }
        };

        let response = self.client.get(url).send().map_err(wrap)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.bytes().map_err(wrap)?;
        Ok(body.to_vec())
    }
}

/// Extracts `.tar.gz` archives in-process.
#[derive(Debug, Clone, Copy, Default)]
pub struct TarGzUnpacker;

impl Unpacker for TarGzUnpacker {
    fn unpack(&self, archive: &Path, dest: &Path) -> Result<(), FetchError> {
        let fail = |reason: String| FetchError::Extract {
            archive: archive.to_path_buf(),
            reason,
        };
        let file = File::open(archive).map_err(|e| fail(e.to_string()))?;
        let mut tar = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
        tar.set_preserve_permissions(true);
        tar.unpack(dest).map_err(|e| fail(e.to_string()))
    }
}
