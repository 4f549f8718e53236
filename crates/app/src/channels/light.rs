//! Light handler: fire-and-forget indicator commands.

use cubelink_domain::error::CubeError;
use cubelink_domain::protocol::light::{self, LightOperation};

use super::write;
use crate::ports::SubChannel;

pub(crate) struct LightHandler<C> {
    channel: C,
}

impl<C: SubChannel> LightHandler<C> {
    pub(crate) fn new(channel: C) -> Self {
        Self { channel }
    }

    pub(crate) async fn turn_on(&self, operation: &LightOperation) -> Result<(), CubeError> {
        write(&self.channel, light::encode_turn_on(operation)?).await
    }

    pub(crate) async fn turn_on_with_scenario(
        &self,
        operations: &[LightOperation],
        repeat: u8,
    ) -> Result<(), CubeError> {
        write(&self.channel, light::encode_scenario(operations, repeat)?).await
    }

    pub(crate) async fn turn_off(&self) -> Result<(), CubeError> {
        write(&self.channel, light::encode_turn_off()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cubelink_domain::channel::Domain;
    use cubelink_domain::error::ErrorKind;

    use crate::channels::mock::MockChannel;

    #[tokio::test]
    async fn should_write_encoded_frames() {
        let handler = LightHandler::new(MockChannel::for_domain(Domain::Light));
        handler
            .turn_on(&LightOperation {
                duration_ms: 100,
                red: 1,
                green: 2,
                blue: 3,
            })
            .await
            .unwrap();
        handler.turn_off().await.unwrap();

        assert_eq!(
            handler.channel.written(),
            vec![vec![0x03, 0x0a, 0x01, 0x01, 0x01, 0x02, 0x03], vec![0x01]]
        );
    }

    #[tokio::test]
    async fn should_write_nothing_when_parameters_are_rejected() {
        let handler = LightHandler::new(MockChannel::for_domain(Domain::Light));
        let err = handler.turn_on_with_scenario(&[], 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
        assert!(handler.channel.written().is_empty());
    }

    #[tokio::test]
    async fn should_surface_write_failure_as_transport_error() {
        let channel = MockChannel {
            fail_writes: true,
            ..MockChannel::for_domain(Domain::Light)
        };
        let handler = LightHandler::new(channel);
        let err = handler.turn_off().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }
}
