use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SoundEffect {
    Death,
    Door,
    ItemAdded,
    KeyGained,
    Gateway,
    StoryAdvance,
    InventoryCleared,
    ItemUsed,
    TrapKill,
}

impl SoundEffect {
    /// Index into the clip table shipped with the audio assets.
    pub fn clip_index(self) -> u32 {
        match self {
            SoundEffect::Death => 2,
            SoundEffect::Door => 3,
            SoundEffect::ItemAdded => 4,
            SoundEffect::KeyGained => 5,
            SoundEffect::Gateway => 6,
            SoundEffect::StoryAdvance => 7,
            SoundEffect::InventoryCleared => 8,
            SoundEffect::ItemUsed => 9,
            SoundEffect::TrapKill => 12,
        }
    }
}

/// Fire-and-forget playback; gameplay never reads anything back.
pub trait AudioSink {
    fn play(&self, effect: SoundEffect);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogAudioSink;

impl AudioSink for LogAudioSink {
    fn play(&self, effect: SoundEffect) {
        debug!(?effect, clip = effect.clip_index(), "sound_effect_played");
    }
}

#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub(crate) struct RecordingAudioSink {
    played: std::rc::Rc<std::cell::RefCell<Vec<SoundEffect>>>,
}

#[cfg(test)]
impl RecordingAudioSink {
    pub(crate) fn played(&self) -> Vec<SoundEffect> {
        self.played.borrow().clone()
    }
}

#[cfg(test)]
impl AudioSink for RecordingAudioSink {
    fn play(&self, effect: SoundEffect) {
        self.played.borrow_mut().push(effect);
    }
}
