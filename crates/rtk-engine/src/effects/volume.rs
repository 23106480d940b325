//! Volume, panning and their oscillators.

use rtk_ir::{ModuleType, PlayBehaviour, SongFlags};

use crate::channel::ChannelFlags;
use crate::sequencer::Sequencer;

/// A decoded slide parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Slide {
    None,
    Up(i32),
    Down(i32),
    FineUp(i32),
    FineDown(i32),
}

impl Slide {
    /// Split the `xy` parameter shared by volume, channel volume and
    /// global volume slides.
    pub(super) fn decode(param: u8, nibble_priority: bool, both_ignored: bool) -> Slide {
        let (hi, lo) = ((param >> 4) as i32, (param & 0x0F) as i32);
        if nibble_priority {
            return match (hi, lo) {
                (0, 0) => Slide::None,
                (0, lo) => Slide::Down(lo),
                (hi, _) => Slide::Up(hi),
            };
        }
        if param == 0xFF {
            return if both_ignored { Slide::None } else { Slide::Down(15) };
        }
        match (hi, lo) {
            (0, 0) => Slide::None,
            (hi, 0x0F) if hi != 0 => Slide::FineUp(hi),
            (0x0F, lo) if lo != 0 => Slide::FineDown(lo),
            (hi, 0) => Slide::Up(hi),
            (0, lo) => Slide::Down(lo),
            (_, lo) => {
                if both_ignored {
                    Slide::None
                } else {
                    Slide::Down(lo)
                }
            }
        }
    }
}

impl Sequencer<'_> {
    /// Signed amount a decoded slide contributes on this tick.
    fn slide_amount(&self, slide: Slide, fast: bool) -> i32 {
        let regular = self.slide_tick() || fast;
        match slide {
            Slide::Up(v) if regular => v,
            Slide::Down(v) if regular => -v,
            Slide::FineUp(v) if self.fine_tick() => v,
            Slide::FineDown(v) if self.fine_tick() => -v,
            _ => 0,
        }
    }

    fn decode_slide(&self, param: u8) -> Slide {
        let behaviour = self.song.behaviour;
        Slide::decode(
            param,
            behaviour.test(PlayBehaviour::VOLSLIDE_NIBBLE_PRIORITY),
            behaviour.test(PlayBehaviour::IT_VOLSLIDE_BOTH_NIBBLES_IGNORED),
        )
    }

    /// `Dxy` / `Axy`.
    pub(super) fn volume_slide(&mut self, nchn: usize, param: u8) {
        let song = self.song;
        let param = {
            let chn = &mut self.state.channels[nchn];
            if param == 0 {
                // ProTracker has no volume slide memory.
                if song.module_type == ModuleType::Mod {
                    return;
                }
                chn.old_vol_slide
            } else {
                chn.old_vol_slide = param;
                param
            }
        };
        let fast = song.flags.contains(SongFlags::FAST_VOL_SLIDES);
        let delta = self.slide_amount(self.decode_slide(param), fast);
        if delta != 0 {
            let chn = &mut self.state.channels[nchn];
            chn.volume = (chn.volume + delta * 4).clamp(0, 256);
        }
    }

    /// `Nxy`.
    pub(super) fn channel_volume_slide(&mut self, nchn: usize, param: u8) {
        let param = {
            let chn = &mut self.state.channels[nchn];
            if param == 0 {
                chn.old_chn_vol_slide
            } else {
                chn.old_chn_vol_slide = param;
                param
            }
        };
        let delta = self.slide_amount(self.decode_slide(param), false);
        if delta != 0 {
            let chn = &mut self.state.channels[nchn];
            chn.channel_volume = (chn.channel_volume + delta).clamp(0, 64);
        }
    }

    /// `Vxx`. Global volume is kept in 0..=256.
    pub(super) fn set_global_volume(&mut self, param: u8) {
        let song = self.song;
        let it = song.module_type.is_it_family();
        let mut value = if it { param as u32 } else { param as u32 * 2 };
        if value > 128 {
            if it || song.module_type == ModuleType::S3m {
                return;
            }
            value = 128;
        }
        self.state.global_volume = value as i32 * 2;
    }

    /// `Wxy`.
    pub(super) fn global_volume_slide(&mut self, nchn: usize, param: u8) {
        let song = self.song;
        let param = {
            let chn = &mut self.state.channels[nchn];
            if param == 0 {
                chn.old_global_vol_slide
            } else {
                chn.old_global_vol_slide = param;
                param
            }
        };
        let step = if song.module_type.is_it_family() { 2 } else { 4 };
        let delta = self.slide_amount(self.decode_slide(param), false);
        if delta != 0 {
            let global = self.state.global_volume + delta * step;
            self.state.global_volume = global.clamp(0, 256);
        }
    }

    /// Set the channel panning (0..=256).
    pub(super) fn set_pan(&mut self, nchn: usize, pan: i32) {
        let song = self.song;
        let chn = &mut self.state.channels[nchn];
        chn.pan = pan.clamp(0, 256);
        chn.panbrello_offset = 0;
        if song.behaviour.test(PlayBehaviour::PAN_OVERRIDES_SURROUND) {
            chn.flags.remove(ChannelFlags::SURROUND);
        }
    }

    /// `Pxy`.
    pub(super) fn panning_slide(&mut self, nchn: usize, param: u8) {
        let song = self.song;
        let param = {
            let chn = &mut self.state.channels[nchn];
            if param == 0 {
                chn.old_pan_slide
            } else {
                chn.old_pan_slide = param;
                param
            }
        };
        let (hi, lo) = ((param >> 4) as i32, (param & 0x0F) as i32);
        let mut delta = if song.module_type.has_fine_slide_encoding() {
            match (hi, lo) {
                (hi, 0x0F) if hi != 0 => {
                    if self.fine_tick() { -hi * 4 } else { 0 }
                }
                (0x0F, lo) if lo != 0 => {
                    if self.fine_tick() { lo * 4 } else { 0 }
                }
                _ if !self.slide_tick() => 0,
                (_, 0) => -hi * 4,
                (_, lo) => lo * 4,
            }
        } else if !self.slide_tick() {
            0
        } else if hi != 0 {
            hi * 4
        } else {
            -lo * 4
        };
        if song.module_type.is_it_family() {
            delta = -delta;
        }
        if delta != 0 {
            let pan = self.state.channels[nchn].pan + delta;
            self.set_pan(nchn, pan);
        }
    }

    /// `Rxy` / `7xy`.
    pub(super) fn tremolo(&mut self, nchn: usize, param: u8) {
        let chn = &mut self.state.channels[nchn];
        if param & 0x0F != 0 {
            chn.tremolo_depth = (param & 0x0F) * 4;
        }
        if param >> 4 != 0 {
            chn.tremolo_speed = param >> 4;
        }
        chn.flags.insert(ChannelFlags::TREMOLO);
    }

    /// `Yxy`. The offset itself is applied by the tick renderer while the
    /// command stays on the channel.
    pub(super) fn panbrello(&mut self, nchn: usize, param: u8) {
        let chn = &mut self.state.channels[nchn];
        if param & 0x0F != 0 {
            chn.panbrello_depth = param & 0x0F;
        }
        if param >> 4 != 0 {
            chn.panbrello_speed = param >> 4;
        }
    }

    /// `Ixy`: `x` ticks on, `y` ticks off.
    pub(super) fn tremor(&mut self, nchn: usize, param: u8) {
        let song = self.song;
        let chn = &mut self.state.channels[nchn];
        let param = if param == 0 {
            chn.tremor_param
        } else {
            chn.tremor_param = param;
            param
        };
        let (mut on, mut off) = (param >> 4, param & 0x0F);
        if !song.behaviour.test(PlayBehaviour::IT_TREMOR) {
            on += 1;
            off += 1;
        }
        let (on, off) = (on.max(1), off.max(1));
        if chn.tremor_count >= on + off {
            chn.tremor_count = 0;
        }
        chn.flags.set(ChannelFlags::TREMOR_OFF, chn.tremor_count >= on);
        chn.tremor_count += 1;
    }
}
