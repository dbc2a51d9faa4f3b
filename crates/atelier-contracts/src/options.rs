//! Fixed choice sets offered by the studio surfaces.
//!
//! Each enumeration parses from its display label (case-insensitive, surrounding whitespace
//! ignored) and serializes back to the exact label the provider expects.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StudioError;

macro_rules! labelled_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $what:literal {
            $($(#[$vmeta:meta])* $variant:ident => $label:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }

            pub fn labels() -> Vec<&'static str> {
                Self::ALL.iter().map(|value| value.label()).collect()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $name {
            type Err = StudioError;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                let wanted = raw.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|value| value.label().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| {
                        StudioError::invalid_input(format!(
                            "unsupported {} '{}' (expected one of: {})",
                            $what,
                            wanted,
                            Self::labels().join(", ")
                        ))
                    })
            }
        }
    };
}

labelled_enum! {
    /// Aspect ratios accepted by the pro image model.
    AspectRatio, "aspect ratio" {
        #[default]
        Square => "1:1",
        Portrait2x3 => "2:3",
        Landscape3x2 => "3:2",
        Portrait3x4 => "3:4",
        Landscape4x3 => "4:3",
        Portrait9x16 => "9:16",
        Landscape16x9 => "16:9",
        Ultrawide21x9 => "21:9",
    }
}

labelled_enum! {
    /// Video generation only supports the two orientations.
    VideoAspectRatio, "video aspect ratio" {
        #[default]
        Landscape => "16:9",
        Portrait => "9:16",
    }
}

labelled_enum! {
    ImageSize, "resolution" {
        #[default]
        OneK => "1K",
        TwoK => "2K",
        FourK => "4K",
    }
}

labelled_enum! {
    VideoResolution, "video resolution" {
        #[default]
        Hd720 => "720p",
        Hd1080 => "1080p",
    }
}

labelled_enum! {
    PromptStyle, "prompt style" {
        #[default]
        Photorealistic => "Photorealistic",
        Cinematic => "Cinematic",
        Minimalist => "Minimalist",
        Cyberpunk => "Cyberpunk",
        StudioLighting => "Studio Lighting",
        Abstract => "Abstract",
        Render3d => "3D Render",
    }
}
