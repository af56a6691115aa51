use std::io::Write;

use anyhow::{Context, Result};
use offline_core::{
    CacheStorage, Destination, Interceptor, Network, Request, RequestMode, Response,
};
use tracing::info;
use url::Url;

pub fn build_request(
    origin: &Url,
    target: &str,
    navigate: bool,
    dest: Option<&str>,
) -> Result<Request> {
    let url = origin.join(target).with_context(|| format!("resolving {target} against {origin}"))?;
    let mut request = Request::new(url);
    if navigate {
        request = request.with_mode(RequestMode::Navigate).with_destination(Destination::Document);
    }
    if let Some(dest) = dest {
        request = request.with_destination(Destination::parse(dest));
    }
    Ok(request)
}

pub async fn install<S, N, W>(interceptor: &Interceptor<S, N>, out: &mut W) -> Result<()>
where
    S: CacheStorage,
    N: Network,
    W: Write,
{
    let report = interceptor.install().await.context("installing cache region")?;
    info!(cache = %report.cache_name, entries = report.keys.len(), "install complete");
    writeln!(out, "installed {} entries into {}", report.keys.len(), report.cache_name)?;
    for key in &report.keys {
        writeln!(out, "  {key}")?;
    }
    Ok(())
}

pub async fn fetch<S, N, W>(
    interceptor: &Interceptor<S, N>,
    request: &Request,
    out: &mut W,
) -> Result<()>
where
    S: CacheStorage,
    N: Network,
    W: Write,
{
    if !interceptor.resume().await? {
        info!(cache = %interceptor.config().cache_name, "no installed region, fetching directly");
    }

    let response = interceptor
        .handle_fetch(request)
        .await
        .with_context(|| format!("fetching {}", request.url))?;
    describe(&response);
    out.write_all(&response.body)?;
    out.flush()?;
    Ok(())
}

pub async fn keys<S, N, W>(interceptor: &Interceptor<S, N>, out: &mut W) -> Result<()>
where
    S: CacheStorage,
    N: Network,
    W: Write,
{
    for key in interceptor.cached_keys().await? {
        writeln!(out, "{key}")?;
    }
    Ok(())
}

fn describe(response: &Response) {
    eprintln!(
        "{} {} ({} bytes{})",
        response.status,
        response.url,
        response.body.len(),
        response.content_type.as_deref().map(|ct| format!(", {ct}")).unwrap_or_default()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use offline_core::{DiskCacheStorage, HttpNetwork, ShimConfig};

    fn origin() -> Url {
        Url::parse("http://localhost:5000/").unwrap()
    }

    #[test]
    fn navigate_flag_marks_a_document_navigation() {
        let request = build_request(&origin(), "/", true, None).unwrap();
        assert!(request.is_navigation());
        assert_eq!(request.destination, Destination::Document);
    }

    #[test]
    fn dest_flag_selects_the_destination() {
        let request =
            build_request(&origin(), "static/img/logo.png", false, Some("image")).unwrap();
        assert_eq!(request.url.as_str(), "http://localhost:5000/static/img/logo.png");
        assert_eq!(request.destination, Destination::Image);
        assert!(!request.is_navigation());
    }

    #[tokio::test]
    async fn keys_on_a_fresh_storage_prints_nothing() {
        let temp = tempfile::tempdir().unwrap();
        let config = ShimConfig::default().with_storage_root(temp.path());
        let storage = DiskCacheStorage::new(temp.path()).unwrap();
        let interceptor = Interceptor::new(config, storage, HttpNetwork::new());

        let mut out = Vec::new();
        keys(&interceptor, &mut out).await.unwrap();
        assert!(out.is_empty());
    }
}
