//! Sound handler: fire-and-forget sound effects and melodies.

use cubelink_domain::error::CubeError;
use cubelink_domain::protocol::sound::{self, SoundOperation};

use super::write;
use crate::ports::SubChannel;

pub(crate) struct SoundHandler<C> {
    channel: C,
}

impl<C: SubChannel> SoundHandler<C> {
    pub(crate) fn new(channel: C) -> Self {
        Self { channel }
    }

    pub(crate) async fn play_preset(&self, sound_id: u8) -> Result<(), CubeError> {
        write(&self.channel, sound::encode_preset(sound_id)?).await
    }

    pub(crate) async fn play(
        &self,
        operations: &[SoundOperation],
        repeat: u8,
    ) -> Result<(), CubeError> {
        write(&self.channel, sound::encode_melody(operations, repeat)?).await
    }

    pub(crate) async fn stop(&self) -> Result<(), CubeError> {
        write(&self.channel, sound::encode_stop()).await
    }
}
