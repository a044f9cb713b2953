// Layout endpoints: `/layouts/config/`

use serde_json::Value;
use tracing::debug;

use crate::client::McsClient;
use crate::error::Error;
use crate::models::{Document, Layout, decode_document, decode_listing};

impl McsClient {
    /// List all configured layouts.
    pub async fn list_layouts(&self) -> Result<Vec<Layout>, Error> {
        let value = self.get("layouts/config/").await?;
        decode_listing("layouts", value)
    }

    /// Fetch one layout fresh from the device.
    pub async fn get_layout(&self, uuid: &str) -> Result<Document<Layout>, Error> {
        let value = self.get(&format!("layouts/config/{uuid}")).await?;
        decode_document("layout", value)
    }

    /// Replace a layout with `layout.raw` (full-object PUT).
    pub async fn put_layout(&self, layout: &Document<Layout>) -> Result<(), Error> {
        let uuid = &layout.model.uuid;
        debug!(%uuid, "updating layout");
        self.put(
            &format!("layouts/config/{uuid}"),
            &Value::Object(layout.raw.clone()),
        )
        .await?;
        Ok(())
    }
}
