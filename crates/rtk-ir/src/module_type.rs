//! The tracker family a module was authored in.

/// Source format of a module. Selects default quirks and a few
/// format-wide branches (pitch representation, command subsets).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ModuleType {
    /// ProTracker / NoiseTracker and compatibles.
    #[default]
    Mod,
    /// Scream Tracker 3.
    S3m,
    /// FastTracker 2.
    Xm,
    /// Impulse Tracker.
    It,
    /// OpenMPT extended IT.
    Mpt,
    /// Scream Tracker 2.
    Stm,
    /// MultiTracker.
    Mtm,
    /// Composer 669.
    Six69,
    /// Farandole Composer.
    Far,
    /// Epic MegaGames MASI.
    Psm,
    /// Graoumf Tracker.
    Gt2,
}

impl ModuleType {
    /// Formats that store per-sample finetune and relative tone instead of
    /// a middle-C frequency.
    pub fn uses_finetune_and_transpose(self) -> bool {
        matches!(self, ModuleType::Mod | ModuleType::Xm | ModuleType::Mtm)
    }

    /// Impulse Tracker and its extended variant.
    pub fn is_it_family(self) -> bool {
        matches!(self, ModuleType::It | ModuleType::Mpt)
    }

    /// Formats whose volume slide nibbles are resolved by "up wins".
    pub fn has_nibble_priority(self) -> bool {
        matches!(self, ModuleType::Mod | ModuleType::Xm | ModuleType::Mtm)
    }

    /// Formats where `E/F` with `Ex`/`Fx` high nibbles encode fine and
    /// extra-fine slides.
    pub fn has_fine_slide_encoding(self) -> bool {
        !matches!(
            self,
            ModuleType::Mod | ModuleType::Xm | ModuleType::Mtm | ModuleType::Six69
        )
    }

    /// Highest valid global volume command value in this format.
    pub fn max_global_volume_param(self) -> u32 {
        if self.is_it_family() {
            0x80
        } else {
            0x40
        }
    }
}
