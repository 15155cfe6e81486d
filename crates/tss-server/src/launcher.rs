//! Browser launching.

use std::io;

use url::Url;

/// Opens a URL in the user's browser.
pub trait BrowserLauncher: Send + Sync {
    /// Launch the browser at `url`.
    fn launch(&self, url: &str) -> io::Result<()>;
}

/// Launcher using the platform's default browser.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn launch(&self, url: &str) -> io::Result<()> {
        open::that_detached(url)
    }
}

/// Build `http://host:port/path`.
///
/// IPv6 literals are bracketed. A path without a leading slash is treated as
/// if it had one.
pub fn page_url(host: &str, port: u16, path: &str) -> Result<Url, url::ParseError> {
    let host = if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]")
    } else {
        host.to_owned()
    };

    let mut url = Url::parse(&format!("http://{host}:{port}/"))?;
    url.set_path(path);
    Ok(url)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{Mutex, PoisonError};

    use super::*;

    /// Records URLs instead of opening a browser.
    #[derive(Default)]
    pub(crate) struct RecordingLauncher {
        urls: Mutex<Vec<String>>,
        fail: bool,
    }

    impl RecordingLauncher {
        pub(crate) fn failing() -> Self {
            Self {
                urls: Mutex::default(),
                fail: true,
            }
        }

        pub(crate) fn urls(&self) -> Vec<String> {
            self.urls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }
    }

    impl BrowserLauncher for RecordingLauncher {
        fn launch(&self, url: &str) -> io::Result<()> {
            self.urls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(url.to_owned());
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::NotFound, "no browser"));
            }
            Ok(())
        }
    }
}
