// Output endpoints: `/outputs/config/`

use serde_json::Value;
use tracing::debug;

use crate::client::McsClient;
use crate::error::Error;
use crate::models::{Document, Output, decode_document, decode_listing};

impl McsClient {
    /// List all configured outputs.
    pub async fn list_outputs(&self) -> Result<Vec<Output>, Error> {
        let value = self.get("outputs/config/").await?;
        decode_listing("outputs", value)
    }

    /// Fetch one output configuration fresh from the device.
    pub async fn get_output(&self, uuid: &str) -> Result<Document<Output>, Error> {
        let value = self.get(&format!("outputs/config/{uuid}")).await?;
        decode_document("output", value)
    }

    /// Replace an output configuration with `output.raw` (full-object PUT).
    pub async fn put_output(&self, output: &Document<Output>) -> Result<(), Error> {
        let uuid = &output.model.uuid;
        debug!(%uuid, "updating output");
        self.put(
            &format!("outputs/config/{uuid}"),
            &Value::Object(output.raw.clone()),
        )
        .await?;
        Ok(())
    }
}
