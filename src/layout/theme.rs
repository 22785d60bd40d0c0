use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ops::Rgb;

const GOLD: Rgb = Rgb(212, 175, 55);

/// PDF colour scheme, chosen per export and independent of the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub primary: Rgb,
    pub text: Rgb,
    pub text_secondary: Rgb,
    /// Painted behind the whole page when set.
    pub page_background: Option<Rgb>,
    pub cell: Rgb,
    pub stripe: Rgb,
    pub border: Rgb,
    pub header_text: Rgb,
}

impl Theme {
    pub fn palette(self) -> Palette {
        match self {
            Theme::Light => {
                let cell = Rgb::WHITE;
                Palette {
                    primary: GOLD,
                    text: Rgb(44, 44, 44),
                    text_secondary: Rgb(90, 90, 90),
                    page_background: None,
                    cell,
                    stripe: Rgb(248, 246, 240),
                    border: GOLD.over(cell, 0.3),
                    header_text: Rgb::WHITE,
                }
            }
            Theme::Dark => {
                let cell = Rgb(15, 15, 15);
                Palette {
                    primary: GOLD,
                    text: Rgb(245, 245, 245),
                    text_secondary: Rgb(179, 179, 179),
                    page_background: Some(Rgb(10, 10, 10)),
                    cell,
                    stripe: Rgb(18, 18, 18),
                    border: GOLD.over(cell, 0.4),
                    header_text: Rgb::WHITE,
                }
            }
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        })
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" | "clair" => Ok(Theme::Light),
            "dark" | "sombre" => Ok(Theme::Dark),
            other => Err(format!("unknown theme '{}' (expected light or dark)", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_dark_paints_the_page() {
        assert!(Theme::Light.palette().page_background.is_none());
        assert_eq!(Theme::Dark.palette().page_background, Some(Rgb(10, 10, 10)));
    }

    #[test]
    fn borders_are_flattened_gold() {
        assert_eq!(Theme::Light.palette().border, Rgb(242, 231, 195));
    }

    #[test]
    fn parses_names() {
        assert_eq!("Dark".parse::<Theme>(), Ok(Theme::Dark));
        assert_eq!("clair".parse::<Theme>(), Ok(Theme::Light));
        assert!("sepia".parse::<Theme>().is_err());
    }
}
