use std::future::Future;

/// Runs one independent unit of work; an error is logged and becomes `None`.
pub async fn isolate<T, Fut>(scope: &str, fut: Fut) -> Option<T>
where
    Fut: Future<Output = anyhow::Result<T>>,
{
    match fut.await {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(scope, error = %format!("{err:#}"), "item failed; continuing");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn errors_become_none() {
        let ok = isolate("ok", async { Ok::<_, anyhow::Error>(7) }).await;
        assert_eq!(ok, Some(7));

        let failed: Option<u8> = isolate("bad", async { Err(anyhow::anyhow!("boom")) }).await;
        assert_eq!(failed, None);
    }
}
