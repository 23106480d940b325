//! The mixer interface and the built-in sample mixer.
//!
//! The tick scheduler sets, for every sounding voice, its sample
//! position and increment, loop bounds, and volume ramp toward the new
//! left/right gains. A [`Mixer`] turns that into frames. Gains are 14-bit
//! (16384 = unity).

use rtk_ir::{Sample, Song};

use crate::channel::{ChannelFlags, ModChannel, POSITION_FRACBITS};
use crate::frame::Frame;

/// Unity channel gain.
pub const VOLUME_UNITY: i32 = 1 << 14;

const ONE: i64 = 1 << POSITION_FRACBITS;
const FRAC_MASK: i64 = ONE - 1;

/// Renders voices into frames.
pub trait Mixer {
    /// Overwrite `out` with the voices listed in `voices`, advancing their
    /// sample positions and volume ramps. A voice whose sample ends gets
    /// `length = 0`.
    fn mix(&mut self, song: &Song, channels: &mut [ModChannel], voices: &[u16], out: &mut [Frame]);
}

/// Linear-interpolating sample mixer with loop and ramp support.
#[derive(Clone, Debug)]
pub struct SampleMixer {
    /// Master gain, 128 = unity
    preamp: i32,
}

impl SampleMixer {
    pub fn new(preamp: u32) -> Self {
        Self {
            preamp: preamp.min(2000) as i32,
        }
    }
}

impl Default for SampleMixer {
    fn default() -> Self {
        Self::new(128)
    }
}

impl Mixer for SampleMixer {
    fn mix(&mut self, song: &Song, channels: &mut [ModChannel], voices: &[u16], out: &mut [Frame]) {
        for frame in out.iter_mut() {
            let (mut left, mut right) = (0i64, 0i64);
            for &v in voices {
                let Some(chn) = channels.get_mut(v as usize) else {
                    continue;
                };
                if chn.flags.contains(ChannelFlags::ADLIB) || chn.length == 0 {
                    continue;
                }
                let Some(sample) = song.sample(chn.sample) else {
                    chn.length = 0;
                    continue;
                };
                let (l, r) = interpolate(sample, chn);
                step_ramp(chn);
                left += (l * chn.left_vol as i64) >> 14;
                right += (r * chn.right_vol as i64) >> 14;
                advance(chn, 1);
            }
            *frame = Frame::from_accumulator(
                clamp_i32((left * self.preamp as i64) >> 7),
                clamp_i32((right * self.preamp as i64) >> 7),
            );
        }
    }
}

/// Linearly interpolated sample value at the voice position.
fn interpolate(sample: &Sample, chn: &ModChannel) -> (i64, i64) {
    let pos = chn.position_frames() as usize;
    let next = if pos + 1 < chn.length as usize {
        pos + 1
    } else if chn.flags.contains(ChannelFlags::LOOP) && chn.loop_end > chn.loop_start {
        chn.loop_start as usize
    } else {
        pos
    };
    let frac = (chn.position & FRAC_MASK) >> 16;
    let lerp = |a: i16, b: i16| a as i64 + (((b as i64 - a as i64) * frac) >> 16);
    let data = &sample.data;
    let left = lerp(data.left(pos), data.left(next));
    if data.is_stereo() {
        (left, lerp(data.right(pos), data.right(next)))
    } else {
        (left, left)
    }
}

fn clamp_i32(v: i64) -> i32 {
    v.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

fn step_ramp(chn: &mut ModChannel) {
    if chn.ramp_length == 0 {
        return;
    }
    chn.ramp_left += chn.left_ramp_step;
    chn.ramp_right += chn.right_ramp_step;
    chn.ramp_length -= 1;
    if chn.ramp_length == 0 {
        chn.left_vol = chn.new_left_vol;
        chn.right_vol = chn.new_right_vol;
        chn.flags.remove(ChannelFlags::VOLUME_RAMP);
    } else {
        chn.left_vol = chn.ramp_left >> 12;
        chn.right_vol = chn.ramp_right >> 12;
    }
}

/// Move a voice `frames` output frames ahead, wrapping through its loop.
/// Used by the mixer and by seeks that keep sample positions in sync.
pub fn advance(chn: &mut ModChannel, frames: u32) {
    if chn.length == 0 {
        return;
    }
    let delta = chn.increment.saturating_mul(frames as i64);
    let looping = chn.flags.contains(ChannelFlags::LOOP) && chn.loop_end > chn.loop_start;
    let pingpong = looping && chn.flags.contains(ChannelFlags::PINGPONG_LOOP);
    let end = (chn.length as i64) << POSITION_FRACBITS;

    if chn.flags.contains(ChannelFlags::PINGPONG_FLAG) {
        chn.position -= delta;
        let start = if looping { (chn.loop_start as i64) << POSITION_FRACBITS } else { 0 };
        if chn.position >= start {
            return;
        }
        if pingpong {
            chn.position = start + (start - chn.position);
            chn.flags.remove(ChannelFlags::PINGPONG_FLAG);
            wrap_pingpong(chn, start, end);
        } else if looping {
            let len = end - start;
            chn.position = end - (start - chn.position) % len;
        } else {
            chn.length = 0;
            chn.position = 0;
        }
        return;
    }

    chn.position += delta;
    if chn.position < end {
        return;
    }
    if !looping {
        chn.length = 0;
        chn.position = 0;
        return;
    }
    let start = (chn.loop_start as i64) << POSITION_FRACBITS;
    if pingpong {
        chn.position = end - (chn.position - end) - ONE;
        chn.flags.insert(ChannelFlags::PINGPONG_FLAG);
        wrap_pingpong(chn, start, end);
    } else {
        chn.position = start + (chn.position - start) % (end - start);
    }
}

/// Fold a position that overshot a bidirectional loop more than once.
fn wrap_pingpong(chn: &mut ModChannel, start: i64, end: i64) {
    let len = end - start;
    if chn.position >= start && chn.position < end {
        return;
    }
    // One full back-and-forth cycle is 2 * len.
    let offset = (chn.position - start).rem_euclid(2 * len);
    if offset < len {
        chn.position = start + offset;
        chn.flags.remove(ChannelFlags::PINGPONG_FLAG);
    } else {
        chn.position = end - (offset - len) - 1;
        chn.flags.insert(ChannelFlags::PINGPONG_FLAG);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtk_ir::{ModuleType, SampleData};

    fn song_with(data: SampleData) -> Song {
        let mut song = Song::with_channels(ModuleType::It, 1);
        let mut s = Sample::new("s");
        s.data = data;
        song.samples.push(s);
        song
    }

    fn voice(length: u32, increment: i64) -> ModChannel {
        ModChannel {
            sample: 1,
            length,
            increment,
            left_vol: VOLUME_UNITY,
            right_vol: VOLUME_UNITY,
            ..ModChannel::default()
        }
    }

    #[test]
    fn one_shot_sample_ends() {
        let song = song_with(SampleData::Mono16(alloc::vec![1000, 2000, 3000]));
        let mut chns = [voice(3, ONE)];
        let mut out = [Frame::silence(); 5];
        SampleMixer::default().mix(&song, &mut chns, &[0], &mut out);
        assert_eq!(out[0].left, 1000);
        assert_eq!(out[2].right, 3000);
        assert!(out[3].is_silent());
        assert_eq!(chns[0].length, 0);
    }

    #[test]
    fn half_speed_interpolates() {
        let song = song_with(SampleData::Mono16(alloc::vec![0, 1000, 0, 0]));
        let mut chns = [voice(4, ONE / 2)];
        let mut out = [Frame::silence(); 2];
        SampleMixer::default().mix(&song, &mut chns, &[0], &mut out);
        assert_eq!(out[1].left, 500);
    }

    #[test]
    fn full_scale_square_stays_in_range() {
        let data = (0..64).map(|i| if i % 2 == 0 { i16::MAX } else { i16::MIN }).collect();
        let song = song_with(SampleData::Mono16(data));
        let mut chn = voice(64, ONE * 3 / 7);
        chn.flags |= ChannelFlags::LOOP;
        chn.loop_end = 64;
        let mut chns = [chn];
        let mut out = [Frame::silence(); 200];
        SampleMixer::default().mix(&song, &mut chns, &[0], &mut out);
        // Halfway between the two extremes interpolates to about zero.
        assert!(out.iter().any(|f| f.left.abs() < i16::MAX / 2));
        assert!(out.iter().any(|f| f.left > i16::MAX / 2));
        assert!(out.iter().any(|f| f.left < i16::MIN / 2));
    }

    #[test]
    fn forward_loop_wraps() {
        let mut chn = voice(8, ONE * 3);
        chn.flags |= ChannelFlags::LOOP;
        chn.loop_start = 4;
        chn.loop_end = 8;
        chn.set_position_frames(6);
        advance(&mut chn, 1);
        assert_eq!(chn.position_frames(), 5);
        advance(&mut chn, 4);
        assert_eq!(chn.position_frames(), 5);
    }

    #[test]
    fn pingpong_turns_around() {
        let mut chn = voice(8, ONE * 2);
        chn.flags |= ChannelFlags::LOOP | ChannelFlags::PINGPONG_LOOP;
        chn.loop_start = 4;
        chn.loop_end = 8;
        chn.set_position_frames(7);
        advance(&mut chn, 1);
        assert!(chn.flags.contains(ChannelFlags::PINGPONG_FLAG));
        assert_eq!(chn.position_frames(), 6);
        advance(&mut chn, 2);
        assert!(!chn.flags.contains(ChannelFlags::PINGPONG_FLAG));
        assert!(chn.position_frames() >= 4);
    }

    #[test]
    fn ramp_lands_on_target() {
        let song = song_with(SampleData::Mono16(alloc::vec![1000; 64]));
        let mut chn = voice(64, ONE);
        chn.left_vol = 0;
        chn.right_vol = 0;
        chn.new_left_vol = VOLUME_UNITY;
        chn.new_right_vol = VOLUME_UNITY / 2;
        chn.start_ramp(8);
        let mut chns = [chn];
        let mut out = [Frame::silence(); 10];
        SampleMixer::default().mix(&song, &mut chns, &[0], &mut out);
        assert!(out[0].left < out[4].left);
        assert_eq!(out[9], Frame { left: 1000, right: 500 });
    }

    #[test]
    fn opl_voices_are_skipped() {
        let song = song_with(SampleData::Mono16(alloc::vec![1000; 4]));
        let mut chn = voice(4, ONE);
        chn.flags |= ChannelFlags::ADLIB;
        let mut chns = [chn];
        let mut out = [Frame { left: 7, right: 7 }; 2];
        SampleMixer::default().mix(&song, &mut chns, &[0], &mut out);
        assert!(out.iter().all(Frame::is_silent));
    }
}
