// Channel endpoints: `/channels/config/`

use crate::client::McsClient;
use crate::error::Error;
use crate::models::{Channel, decode_listing};

impl McsClient {
    /// List all configured channels.
    pub async fn list_channels(&self) -> Result<Vec<Channel>, Error> {
        let value = self.get("channels/config/").await?;
        decode_listing("channels", value)
    }
}
