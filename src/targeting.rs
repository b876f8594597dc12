// src/targeting.rs
//
// Ad eligibility filters and the price table for banner campaigns.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{AdBanner, AdStatus, Placement};
use crate::phone;

pub const MIN_TARGET_AGE: i32 = 3;
pub const MAX_TARGET_AGE: i32 = 100;
pub const MIN_GRADE: i32 = 1;
pub const MAX_GRADE: i32 = 12;

/// Who is looking at the page. Unknown fields only match untargeted ads.
#[derive(Debug, Clone, Default)]
pub struct Viewer {
    pub country: Option<String>,
    pub age: Option<i32>,
    pub grade: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetingCriteria {
    pub countries: Vec<String>,
    pub min_age: Option<i32>,
    pub max_age: Option<i32>,
    pub grades: Vec<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetingLevel {
    Basic,
    Targeted,
    Premium,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetingError {
    #[error("unsupported campaign duration: {0} days")]
    UnsupportedDuration(i32),

    #[error("age bounds must be within {MIN_TARGET_AGE}..={MAX_TARGET_AGE}")]
    AgeOutOfRange,

    #[error("min_age must not exceed max_age")]
    InvertedAgeRange,

    #[error("grade {0} is outside {MIN_GRADE}..={MAX_GRADE}")]
    GradeOutOfRange(i32),

    #[error("unknown country code `{0}`")]
    UnknownCountry(String),
}

impl TargetingCriteria {
    pub fn of(ad: &AdBanner) -> Self {
        Self {
            countries: ad.target_countries.0.clone(),
            min_age: ad.min_age,
            max_age: ad.max_age,
            grades: ad.target_grades.0.clone(),
        }
    }

    /// Uppercases and dedups country codes, sorts grades, then checks bounds.
    pub fn normalized(mut self) -> Result<Self, TargetingError> {
        for code in self.countries.iter_mut() {
            *code = code.trim().to_ascii_uppercase();
            if phone::find_by_iso(code).is_none() {
                return Err(TargetingError::UnknownCountry(code.clone()));
            }
        }
        self.countries.sort();
        self.countries.dedup();

        for age in [self.min_age, self.max_age].into_iter().flatten() {
            if !(MIN_TARGET_AGE..=MAX_TARGET_AGE).contains(&age) {
                return Err(TargetingError::AgeOutOfRange);
            }
        }
        if let (Some(min), Some(max)) = (self.min_age, self.max_age) {
            if min > max {
                return Err(TargetingError::InvertedAgeRange);
            }
        }

        if let Some(&bad) = self
            .grades
            .iter()
            .find(|g| !(MIN_GRADE..=MAX_GRADE).contains(*g))
        {
            return Err(TargetingError::GradeOutOfRange(bad));
        }
        self.grades.sort_unstable();
        self.grades.dedup();

        Ok(self)
    }

    pub fn level(&self) -> TargetingLevel {
        let kinds = [
            !self.countries.is_empty(),
            self.min_age.is_some() || self.max_age.is_some(),
            !self.grades.is_empty(),
        ]
        .into_iter()
        .filter(|used| *used)
        .count();

        match kinds {
            0 => TargetingLevel::Basic,
            1 => TargetingLevel::Targeted,
            _ => TargetingLevel::Premium,
        }
    }
}

pub fn matches_location(countries: &[String], viewer_country: Option<&str>) -> bool {
    if countries.is_empty() {
        return true;
    }
    match viewer_country {
        Some(c) => countries.iter().any(|t| t.eq_ignore_ascii_case(c)),
        None => false,
    }
}

pub fn matches_age(min_age: Option<i32>, max_age: Option<i32>, viewer_age: Option<i32>) -> bool {
    if min_age.is_none() && max_age.is_none() {
        return true;
    }
    let Some(age) = viewer_age else {
        return false;
    };
    min_age.map_or(true, |min| age >= min) && max_age.map_or(true, |max| age <= max)
}

pub fn matches_grade(grades: &[i32], viewer_grade: Option<i32>) -> bool {
    if grades.is_empty() {
        return true;
    }
    viewer_grade.map_or(false, |g| grades.contains(&g))
}

/// Active and inside its paid window.
pub fn is_live(ad: &AdBanner, now: DateTime<Utc>) -> bool {
    if ad.status != AdStatus::Active.as_str() {
        return false;
    }
    match (ad.starts_at, ad.ends_at) {
        (Some(start), Some(end)) => start <= now && now < end,
        _ => false,
    }
}

pub fn is_eligible(ad: &AdBanner, viewer: &Viewer, placement: Placement, now: DateTime<Utc>) -> bool {
    ad.placement == placement.as_str()
        && matches_location(&ad.target_countries.0, viewer.country.as_deref())
        && matches_age(ad.min_age, ad.max_age, viewer.age)
        && matches_grade(&ad.target_grades.0, viewer.grade)
        && is_live(ad, now)
}

/// Eligible ads, least shown first so campaigns rotate evenly.
pub fn select_ads(
    ads: Vec<AdBanner>,
    viewer: &Viewer,
    placement: Placement,
    now: DateTime<Utc>,
    limit: usize,
) -> Vec<AdBanner> {
    let mut eligible: Vec<AdBanner> = ads
        .into_iter()
        .filter(|ad| is_eligible(ad, viewer, placement, now))
        .collect();
    eligible.sort_by_key(|ad| (ad.impressions, ad.id));
    eligible.truncate(limit);
    eligible
}

/// Base price in cents per duration: [basic, targeted, premium].
const PRICE_TABLE: &[(i32, [i64; 3])] = &[
    (7, [2_500, 4_000, 6_000]),
    (14, [4_500, 7_000, 10_500]),
    (30, [9_000, 14_000, 20_000]),
    (90, [24_000, 37_500, 54_000]),
];

pub fn supported_durations() -> impl Iterator<Item = i32> {
    PRICE_TABLE.iter().map(|(days, _)| *days)
}

/// Percent applied on top of the base price.
pub fn placement_multiplier(placement: Placement) -> i64 {
    match placement {
        Placement::DashboardBanner => 150,
        Placement::Sidebar => 100,
        Placement::CoursePage => 125,
        Placement::CommunityFeed => 110,
        Placement::VideoOverlay => 175,
    }
}

pub fn base_price(duration_days: i32, level: TargetingLevel) -> Result<i64, TargetingError> {
    let (_, row) = PRICE_TABLE
        .iter()
        .find(|(days, _)| *days == duration_days)
        .ok_or(TargetingError::UnsupportedDuration(duration_days))?;

    Ok(match level {
        TargetingLevel::Basic => row[0],
        TargetingLevel::Targeted => row[1],
        TargetingLevel::Premium => row[2],
    })
}

pub fn quote(
    placement: Placement,
    duration_days: i32,
    criteria: &TargetingCriteria,
) -> Result<i64, TargetingError> {
    let base = base_price(duration_days, criteria.level())?;
    Ok(base * placement_multiplier(placement) / 100)
}
