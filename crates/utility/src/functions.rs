use anyhow::{anyhow, Context};
use backoff::backoff::Backoff;
use futures::Future;
use serde::de::DeserializeOwned;
use tracing::{instrument, warn};
use unicode_truncate::UnicodeTruncateStr;

use crate::here;

#[instrument(skip(bytes))]
pub fn validate_json_bytes<T>(bytes: &[u8]) -> anyhow::Result<T>
where
    T: DeserializeOwned,
{
    let deserializer = &mut serde_json::Deserializer::from_slice(bytes);
    let data: Result<T, _> = serde_path_to_error::deserialize(deserializer);

    match data {
        Ok(data) => Ok(data),
        Err(e) => {
            eprintln!(
                "Deserialization error at '{}' in {}.",
                e.path().to_string(),
                here!()
            );

            match serde_json::from_slice::<serde_json::Value>(bytes) {
                Ok(v) => {
                    let mut data = format!("{}", v);

                    if data.len() >= 1024 {
                        let (truncated_data, _len) = data.unicode_truncate(1024);
                        data = truncated_data.to_string();
                    }

                    eprintln!("Data:\r\n{}", data);
                }
                Err(e) => {
                    eprintln!("Failed to convert data to JSON: {:?}", e);
                    eprintln!(
                        "Data:\r\n{:?}",
                        std::str::from_utf8(bytes).context(here!())?
                    );
                }
            }

            Err(e.into())
        }
    }
}

pub async fn try_run_with_config<F, R, C, Fut>(func: F, config: C) -> anyhow::Result<R>
where
    F: Fn() -> Fut,
    C: Backoff,
    Fut: Future<Output = anyhow::Result<R>>,
{
    Ok(backoff::future::retry(config, || async {
        let result = func().await.map_err(|e| {
            warn!("{}", e.to_string());
            anyhow!(e).context(here!())
        })?;

        Ok(result)
    })
    .await
    .context(here!())?)
}
