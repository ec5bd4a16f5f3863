use std::sync::LazyLock;

use regex::{Captures, Regex};

static SEMICOLON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([-+]?\d+(?:\.\d+)?)\s*;\s*([-+]?\d+(?:\.\d+)?)").unwrap()
});
static DMS_RE: LazyLock<Regex> = LazyLock::new(|| {
    let part = r#"(\d+(?:\.\d+)?)°\s*(?:(\d+(?:\.\d+)?)[′']\s*)?(?:(\d+(?:\.\d+)?)[″"]\s*)?"#;
    Regex::new(&format!(r"{part}([NS])[\s,]+{part}([EW])")).unwrap()
});
static DECIMAL_PAIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([-+]?\d+\.\d+)[,\s]+([-+]?\d+\.\d+)").unwrap());

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn in_range(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }
}

/// Recognized notations, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordFormat {
    /// `41.123; -73.456`: what the `geo` microformat span carries.
    DecimalSemicolon,
    /// `41°15′36″N 73°58′42″W`
    Dms,
    /// `41.123, -73.456` or `41.123 -73.456`
    DecimalPair,
}

impl CoordFormat {
    pub const ALL: [CoordFormat; 3] = [
        CoordFormat::DecimalSemicolon,
        CoordFormat::Dms,
        CoordFormat::DecimalPair,
    ];

    fn try_parse(self, text: &str) -> Option<Coordinates> {
        match self {
            CoordFormat::DecimalSemicolon => decimal_pair(&SEMICOLON_RE, text),
            CoordFormat::DecimalPair => decimal_pair(&DECIMAL_PAIR_RE, text),
            CoordFormat::Dms => {
                let caps = DMS_RE.captures(text)?;
                let mut lat = dms_to_decimal(&caps, 1)?;
                let mut lon = dms_to_decimal(&caps, 5)?;
                if &caps[4] == "S" {
                    lat = -lat;
                }
                if &caps[8] == "W" {
                    lon = -lon;
                }
                Some(Coordinates { lat, lon })
            }
        }
    }
}

/// Parse free-form coordinate text. `None` means no known notation matched.
pub fn parse(text: &str) -> Option<Coordinates> {
    parse_with_format(text).map(|(c, _)| c)
}

/// Like [`parse`], also reporting which notation matched.
pub fn parse_with_format(text: &str) -> Option<(Coordinates, CoordFormat)> {
    CoordFormat::ALL
        .iter()
        .find_map(|f| f.try_parse(text).map(|c| (c, *f)))
}

fn decimal_pair(re: &Regex, text: &str) -> Option<Coordinates> {
    let caps = re.captures(text)?;
    let lat = caps[1].parse::<f64>().ok()?;
    let lon = caps[2].parse::<f64>().ok()?;
    Some(Coordinates { lat, lon })
}

/// Degrees at group `first`, optional minutes and seconds in the next two groups.
fn dms_to_decimal(caps: &Captures, first: usize) -> Option<f64> {
    let component = |i: usize| -> Option<f64> {
        match caps.get(i) {
            Some(m) => m.as_str().parse::<f64>().ok(),
            None => Some(0.0),
        }
    };
    let deg = component(first)?;
    let min = component(first + 1)?;
    let sec = component(first + 2)?;
    Some(deg + min / 60.0 + sec / 3600.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semicolon_decimal_is_exact() {
        let c = parse("41.123; -73.456").unwrap();
        assert_eq!(c.lat, 41.123);
        assert_eq!(c.lon, -73.456);
    }

    #[test]
    fn semicolon_inside_markup_text() {
        let (c, fmt) = parse_with_format("﻿ / ﻿41.90806; -87.62944﻿ (Site C-41)").unwrap();
        assert_eq!(fmt, CoordFormat::DecimalSemicolon);
        assert_eq!(c.lat, 41.90806);
        assert_eq!(c.lon, -87.62944);
    }

    #[test]
    fn signs_on_both_components() {
        let c = parse("-33.5; +151.25").unwrap();
        assert_eq!(c.lat, -33.5);
        assert_eq!(c.lon, 151.25);
    }

    #[test]
    fn dms_north_west() {
        let (c, fmt) = parse_with_format("41°15′36″N 73°58′42″W").unwrap();
        assert_eq!(fmt, CoordFormat::Dms);
        let lat = 41.0 + 15.0 / 60.0 + 36.0 / 3600.0;
        let lon = -(73.0 + 58.0 / 60.0 + 42.0 / 3600.0);
        assert!((c.lat - lat).abs() < 1e-9);
        assert!((c.lon - lon).abs() < 1e-9);
    }

    #[test]
    fn dms_south_east() {
        let c = parse("33°52′4″S 151°12′26″E").unwrap();
        assert!(c.lat < 0.0);
        assert!(c.lon > 0.0);
        assert!((c.lat + (33.0 + 52.0 / 60.0 + 4.0 / 3600.0)).abs() < 1e-9);
    }

    #[test]
    fn dms_ascii_marks_and_missing_seconds() {
        let c = parse("38°55'N 77°02'W").unwrap();
        assert!((c.lat - (38.0 + 55.0 / 60.0)).abs() < 1e-9);
        assert!((c.lon + (77.0 + 2.0 / 60.0)).abs() < 1e-9);
    }

    #[test]
    fn dms_ascii_seconds_mark() {
        let (c, fmt) = parse_with_format(r#"38°55'12"N 77°02'30"W"#).unwrap();
        assert_eq!(fmt, CoordFormat::Dms);
        assert!((c.lat - (38.0 + 55.0 / 60.0 + 12.0 / 3600.0)).abs() < 1e-9);
        assert!((c.lon + (77.0 + 2.0 / 60.0 + 30.0 / 3600.0)).abs() < 1e-9);
    }

    #[test]
    fn comma_and_space_pairs() {
        let (c, fmt) = parse_with_format("55.90806, 12.43083").unwrap();
        assert_eq!(fmt, CoordFormat::DecimalPair);
        assert_eq!((c.lat, c.lon), (55.90806, 12.43083));

        let c = parse("coords 47.61 -122.33 approx").unwrap();
        assert_eq!((c.lat, c.lon), (47.61, -122.33));
    }

    #[test]
    fn semicolon_wins_over_later_formats() {
        // Both a DMS pair and a semicolon pair are present.
        let (c, fmt) =
            parse_with_format("41°15′36″N 73°58′42″W / 41.26; -73.97833").unwrap();
        assert_eq!(fmt, CoordFormat::DecimalSemicolon);
        assert_eq!(c.lat, 41.26);
    }

    #[test]
    fn garbage_is_none() {
        assert!(parse("garbage text").is_none());
        assert!(parse("").is_none());
        assert!(parse("12 34").is_none());
    }

    #[test]
    fn range_check() {
        assert!(Coordinates { lat: 41.0, lon: -73.0 }.in_range());
        assert!(!Coordinates { lat: 141.0, lon: -73.0 }.in_range());
        assert!(!Coordinates { lat: 41.0, lon: -273.0 }.in_range());
    }
}
