//! Protocol version negotiation, run once per connection.

use cubelink_domain::error::CubeError;
use cubelink_domain::version::ProtocolVersion;

use crate::channels::configuration::ConfigurationHandler;
use crate::ports::SubChannel;

/// Ask the cube for its protocol version.
///
/// A reply that does not parse as a version falls back to
/// [`ProtocolVersion::BASELINE`]; only transport failures, timeouts and a
/// closed connection are errors.
pub(crate) async fn negotiate<C: SubChannel>(
    configuration: &ConfigurationHandler<C>,
) -> Result<ProtocolVersion, CubeError> {
    let raw = configuration.request_version().await?;
    match ProtocolVersion::parse(&raw) {
        Ok(version) => {
            tracing::info!(%version, layout = ?version.layout(), "protocol version negotiated");
            Ok(version)
        }
        Err(err) => {
            tracing::warn!(
                raw = %raw.escape_debug(),
                %err,
                fallback = %ProtocolVersion::BASELINE,
                "unparsable protocol version"
            );
            Ok(ProtocolVersion::BASELINE)
        }
    }
}
