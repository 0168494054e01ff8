//! Hazard tables
//!
//! Termination and promotion hazard rates, banded by job level, age band, and
//! tenure band. Lookup is O(1) via a dense map keyed on the band tuple.

use crate::error::SimError;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Five-year age bands from 18 up, collapsing anything below/above into the
/// edge bands. Mirrors the fixed-bucket style of a level/tenure band lookup:
/// a small ordered list of upper bounds, first match wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AgeBand(pub u8);

impl AgeBand {
    const BOUNDS: [(u32, u8); 9] = [
        (25, 0), (30, 1), (35, 2), (40, 3), (45, 4),
        (50, 5), (55, 6), (65, 7), (u32::MAX, 8),
    ];

    pub fn from_age(age: u32) -> AgeBand {
        for (upper, band) in Self::BOUNDS {
            if age < upper {
                return AgeBand(band);
            }
        }
        AgeBand(8)
    }

    pub fn as_str(&self) -> &'static str {
        match self.0 {
            0 => "<25",
            1 => "25-29",
            2 => "30-34",
            3 => "35-39",
            4 => "40-44",
            5 => "45-49",
            6 => "50-54",
            7 => "55-64",
            _ => "65+",
        }
    }

    /// Inverse of `as_str`, for CSV-loaded hazard rows that carry the band
    /// label rather than a raw age.
    pub fn from_label(label: &str) -> Option<AgeBand> {
        (0..=8).map(AgeBand).find(|band| band.as_str() == label)
    }
}

/// Tenure bands in whole years of service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TenureBand(pub u8);

impl TenureBand {
    const BOUNDS: [(u32, u8); 6] = [(1, 0), (2, 1), (3, 2), (5, 3), (10, 4), (u32::MAX, 5)];

    pub fn from_tenure(tenure: u32) -> TenureBand {
        for (upper, band) in Self::BOUNDS {
            if tenure < upper {
                return TenureBand(band);
            }
        }
        TenureBand(5)
    }

    pub fn as_str(&self) -> &'static str {
        match self.0 {
            0 => "0",
            1 => "1",
            2 => "2",
            3 => "3-4",
            4 => "5-9",
            _ => "10+",
        }
    }

    /// Inverse of `as_str`, for CSV-loaded hazard rows that carry the band
    /// label rather than a raw tenure.
    pub fn from_label(label: &str) -> Option<TenureBand> {
        (0..=5).map(TenureBand).find(|band| band.as_str() == label)
    }
}

pub type HazardKey = (u8, AgeBand, TenureBand);

/// A loaded, validated hazard table. Rates are checked to be in `[0,1]` at
/// construction; any out-of-range row fails the whole load.
#[derive(Debug, Clone, Default)]
pub struct HazardTable {
    rates: HashMap<HazardKey, Decimal>,
}

impl HazardTable {
    pub fn from_rows(rows: Vec<(u8, AgeBand, TenureBand, Decimal)>) -> Result<HazardTable, SimError> {
        let mut rates = HashMap::with_capacity(rows.len());
        for (level, age_band, tenure_band, rate) in rows {
            if rate < Decimal::ZERO || rate > Decimal::ONE {
                return Err(SimError::Config {
                    message: format!(
                        "hazard rate out of [0,1] for level={level} age_band={} tenure_band={}: {rate}",
                        age_band.as_str(),
                        tenure_band.as_str()
                    ),
                });
            }
            rates.insert((level, age_band, tenure_band), rate);
        }
        Ok(HazardTable { rates })
    }

    /// Look up the hazard rate for `(level, age, tenure)`. Fails closed:
    /// missing bands are a fatal `HazardMiss`, never silently imputed.
    pub fn rate_for(&self, level: u8, age: u32, tenure: u32) -> Result<Decimal, SimError> {
        let age_band = AgeBand::from_age(age);
        let tenure_band = TenureBand::from_tenure(tenure);
        self.rates
            .get(&(level, age_band, tenure_band))
            .copied()
            .ok_or_else(|| SimError::HazardMiss {
                level,
                age_band: age_band.as_str().to_string(),
                tenure_band: tenure_band.as_str().to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn age_band_boundaries_are_half_open() {
        assert_eq!(AgeBand::from_age(24).0, 0);
        assert_eq!(AgeBand::from_age(25).0, 1);
        assert_eq!(AgeBand::from_age(64).0, 7);
        assert_eq!(AgeBand::from_age(65).0, 8);
    }

    #[test]
    fn tenure_band_boundaries_are_half_open() {
        assert_eq!(TenureBand::from_tenure(0).0, 0);
        assert_eq!(TenureBand::from_tenure(1).0, 1);
        assert_eq!(TenureBand::from_tenure(9).0, 4);
        assert_eq!(TenureBand::from_tenure(10).0, 5);
    }

    #[test]
    fn band_labels_round_trip() {
        for band in (0..=8).map(AgeBand) {
            assert_eq!(AgeBand::from_label(band.as_str()), Some(band));
        }
        for band in (0..=5).map(TenureBand) {
            assert_eq!(TenureBand::from_label(band.as_str()), Some(band));
        }
        assert_eq!(AgeBand::from_label("not-a-band"), None);
    }

    #[test]
    fn rejects_rate_outside_unit_interval() {
        let rows = vec![(1, AgeBand(0), TenureBand(0), Decimal::new(150, 2))];
        assert!(HazardTable::from_rows(rows).is_err());
    }

    #[test]
    fn missing_band_is_hazard_miss() {
        let table = HazardTable::from_rows(vec![]).unwrap();
        let err = table.rate_for(3, 40, 5).unwrap_err();
        assert!(matches!(err, SimError::HazardMiss { .. }));
    }

    #[test]
    fn present_band_resolves() {
        let rows = vec![(3, AgeBand::from_age(40), TenureBand::from_tenure(5), Decimal::new(8, 2))];
        let table = HazardTable::from_rows(rows).unwrap();
        assert_eq!(table.rate_for(3, 40, 5).unwrap(), Decimal::new(8, 2));
    }
}
