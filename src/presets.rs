//! Named export presets for known page regions.

use std::fmt;
use std::str::FromStr;

use crate::config::{ConfigOverrides, Orientation, PageSize};

/// Selector of the content panel both presets capture.
pub const DETAIL_CONTENT_SELECTOR: &str = ".notice-detail-content";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Notice,
    Admission,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Notice, Role::Admission];

    pub fn preset(self) -> &'static RolePreset {
        match self {
            Role::Notice => &PRESETS[0],
            Role::Admission => &PRESETS[1],
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Notice => "notice",
            Role::Admission => "admission",
        })
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "notice" => Ok(Role::Notice),
            "admission" => Ok(Role::Admission),
            other => Err(format!("unknown role '{other}' (expected notice or admission)")),
        }
    }
}

/// Fixed parameters of one role.
#[derive(Debug, Clone, PartialEq)]
pub struct RolePreset {
    pub selector: &'static str,
    pub title: &'static str,
    pub default_filename: &'static str,
    /// Status message when the selector matches nothing.
    pub not_found_message: &'static str,
    pub margin: f32,
    pub quality: f32,
}

static PRESETS: [RolePreset; 2] = [
    RolePreset {
        selector: DETAIL_CONTENT_SELECTOR,
        title: "Notice",
        default_filename: "notice.pdf",
        not_found_message: "Notice content area not found",
        margin: 20.0,
        quality: 0.95,
    },
    RolePreset {
        selector: DETAIL_CONTENT_SELECTOR,
        title: "Admission Information",
        default_filename: "admission-info.pdf",
        not_found_message: "Admission content area not found",
        margin: 20.0,
        quality: 0.95,
    },
];

impl RolePreset {
    /// Overrides for a conversion of this role written to `filename`.
    pub fn overrides(&self, filename: Option<&str>) -> ConfigOverrides {
        ConfigOverrides {
            filename: Some(filename.unwrap_or(self.default_filename).to_string()),
            title: Some(self.title.to_string()),
            page_size: Some(PageSize::A4),
            orientation: Some(Orientation::Portrait),
            margin: Some(self.margin),
            quality: Some(self.quality),
            ..ConfigOverrides::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_roles() {
        assert_eq!("notice".parse::<Role>().unwrap(), Role::Notice);
        assert_eq!(" Admission ".parse::<Role>().unwrap(), Role::Admission);
        assert!("brochure".parse::<Role>().is_err());
        for role in Role::ALL {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn presets_share_the_detail_panel() {
        for role in Role::ALL {
            let p = role.preset();
            assert_eq!(p.selector, ".notice-detail-content");
            assert_eq!(p.margin, 20.0);
            assert_eq!(p.quality, 0.95);
        }
        assert_ne!(Role::Notice.preset().title, Role::Admission.preset().title);
    }

    #[test]
    fn caller_filename_wins() {
        let preset = Role::Admission.preset();
        assert_eq!(
            preset.overrides(None).filename.as_deref(),
            Some("admission-info.pdf")
        );
        let o = preset.overrides(Some("custom.pdf"));
        assert_eq!(o.filename.as_deref(), Some("custom.pdf"));
        assert_eq!(o.title.as_deref(), Some("Admission Information"));
        assert_eq!(o.page_size, Some(PageSize::A4));
    }
}
