use http_body_util::{BodyExt, Empty};
use hyper::{body::Bytes, header, Request, Uri};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use url::Url;

use super::{FetchFuture, ProgressSink, Transport, TransportError};
use crate::config::LoaderConfig;

type HttpsClient = Client<HttpsConnector<HttpConnector>, Empty<Bytes>>;

#[derive(Debug, Clone)]
struct Limits {
    max_body_bytes: usize,
    max_redirects: usize,
    user_agent: String,
}

/// Fetches photos over HTTP(S) with hyper and rustls.
#[derive(Clone)]
pub struct HttpTransport {
    client: HttpsClient,
    limits: Limits,
}

impl HttpTransport {
    pub fn new(config: &LoaderConfig) -> Self {
        let https = {
            let builder = match HttpsConnectorBuilder::new().with_native_roots() {
                Ok(builder) => builder,
                Err(err) => {
                    tracing::warn!(
                        "Failed to load native root certificates ({err}). Falling back to WebPKI store."
                    );
                    HttpsConnectorBuilder::new().with_webpki_roots()
                }
            };

            builder.https_or_http().enable_http1().build()
        };

        let client: HttpsClient = Client::builder(TokioExecutor::new()).build(https);

        Self {
            client,
            limits: Limits {
                max_body_bytes: config.max_body_bytes,
                max_redirects: config.max_redirects,
                user_agent: config.user_agent.clone(),
            },
        }
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, url: &Url, progress: ProgressSink) -> FetchFuture {
        let client = self.client.clone();
        let limits = self.limits.clone();
        let url = url.clone();
        Box::pin(async move { http_get(&client, &limits, url, progress).await })
    }
}

#[profiling::function]
async fn http_get(
    client: &HttpsClient,
    limits: &Limits,
    url: Url,
    progress: ProgressSink,
) -> Result<Vec<u8>, TransportError> {
    let mut current = url;
    let mut redirects = 0;

    let res = loop {
        let uri: Uri = current
            .as_str()
            .parse()
            .map_err(|_| TransportError::Uri)?;
        let authority = uri.authority().ok_or(TransportError::Host)?.clone();

        let req = Request::builder()
            .uri(uri)
            .header(header::HOST, authority.as_str())
            .header(header::USER_AGENT, limits.user_agent.as_str())
            .body(Empty::<Bytes>::new())
            .map_err(TransportError::hyper)?;

        tracing::trace!("GET {current}");
        let res = client.request(req).await.map_err(TransportError::hyper)?;

        if res.status().is_redirection() {
            if redirects >= limits.max_redirects {
                return Err(TransportError::TooManyRedirects);
            }

            let location = res
                .headers()
                .get(header::LOCATION)
                .ok_or(TransportError::MissingRedirectLocation)?
                .to_str()
                .map_err(|_| TransportError::InvalidRedirectLocation)?
                .to_string();

            res.into_body()
                .collect()
                .await
                .map_err(TransportError::hyper)?;

            current = resolve_redirect(&current, &location)?;
            redirects += 1;
            tracing::debug!("following redirect #{redirects} to {current}");
            continue;
        }

        if !res.status().is_success() {
            return Err(TransportError::Status(res.status().as_u16()));
        }

        break res;
    };

    let content_length = res
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|s| s.to_str().ok())
        .and_then(|s| s.parse::<usize>().ok());

    if let Some(len) = content_length {
        if len > limits.max_body_bytes {
            return Err(TransportError::BodyTooLarge);
        }
    }

    progress.report_bytes(0, content_length);

    let mut body = res.into_body();
    let mut bytes = Vec::with_capacity(content_length.unwrap_or(0).min(limits.max_body_bytes));

    while let Some(frame_result) = body.frame().await {
        let frame = frame_result.map_err(TransportError::hyper)?;
        let Ok(chunk) = frame.into_data() else {
            continue;
        };

        if bytes.len() + chunk.len() > limits.max_body_bytes {
            return Err(TransportError::BodyTooLarge);
        }

        bytes.extend_from_slice(&chunk);
        progress.report_bytes(bytes.len(), content_length);
    }

    progress.report(1.0);

    Ok(bytes)
}

/// Resolve a `Location` header against the URL that produced it.
pub fn resolve_redirect(current: &Url, location: &str) -> Result<Url, TransportError> {
    current
        .join(location)
        .map_err(|_| TransportError::InvalidRedirectLocation)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn absolute_redirect_replaces_url() {
        let next = resolve_redirect(&url("https://a.example/x.gif"), "http://b.example/y.gif");
        assert_eq!(next.unwrap().as_str(), "http://b.example/y.gif");
    }

    #[test]
    fn relative_redirect_keeps_origin() {
        let base = url("https://cdn.example/photos/1/full.jpg");
        assert_eq!(
            resolve_redirect(&base, "/photos/1/large.jpg")
                .unwrap()
                .as_str(),
            "https://cdn.example/photos/1/large.jpg"
        );
        assert_eq!(
            resolve_redirect(&base, "medium.jpg").unwrap().as_str(),
            "https://cdn.example/photos/1/medium.jpg"
        );
    }

    #[tokio::test]
    #[ignore]
    async fn fetches_over_network() {
        let transport = HttpTransport::new(&LoaderConfig::default());
        let bytes = transport
            .fetch(
                &url("https://upload.wikimedia.org/wikipedia/commons/2/2c/Rotating_earth_%28large%29.gif"),
                ProgressSink::noop(),
            )
            .await
            .unwrap();
        assert!(crate::decode::is_gif(&bytes));
    }
}
