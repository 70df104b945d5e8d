//! Reservation id recovery from free-text event descriptions.
//!
//! Calendar copies of feed events do not always keep their private
//! properties, but the description text written alongside them does. This
//! parser recognises the line formats that have been written over time and
//! returns the reservation identity they carry.
//!
//! Each pattern records the parser version that introduced it. Adding a new
//! line format means adding a pattern with the next version and bumping
//! [`PARSER_VERSION`]; old patterns stay so historical descriptions still
//! resolve.

use crate::types::Identity;

/// Highest pattern version this parser understands.
pub const PARSER_VERSION: u32 = 2;

/// Footer line written into descriptions of feed events.
pub const RESERVATION_FOOTER_PREFIX: &str = "Reservation-Id: ";

const PROFILE_PREFIX: &str = "Profile: ";

/// A recognised description line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptionPattern {
    /// `Profile: Rsrv_<n>` written for campus-event bookings
    ProfileReservation,
    /// `Profile: <schedule>` written for classes; accepted when it has a digit
    ProfileSchedule,
    /// `Reservation-Id: <id>` footer written by this system
    ReservationFooter,
}

impl DescriptionPattern {
    pub const fn version(self) -> u32 {
        match self {
            Self::ProfileReservation | Self::ProfileSchedule => 1,
            Self::ReservationFooter => 2,
        }
    }
}

/// Reservation id found in a description, with the pattern that matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReservation {
    pub reservation_id: String,
    pub pattern: DescriptionPattern,
}

/// Whether a profile name is specific enough to identify a reservation.
///
/// Generic profile labels carry no digits and are shared across many
/// bookings, so they are rejected.
pub fn is_reservation_profile(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && (value.starts_with("Rsrv_") || value.chars().any(|c| c.is_ascii_digit()))
}

/// Scan a description for a known reservation line.
///
/// The footer wins over profile lines because it is written from the
/// resolved identity rather than copied from the feed.
pub fn parse_description(description: &str) -> Option<ParsedReservation> {
    let mut profile = None;

    for line in description.lines().map(str::trim) {
        if let Some(value) = line.strip_prefix(RESERVATION_FOOTER_PREFIX.trim_end()) {
            let value = value.trim();
            if !value.is_empty() {
                return Some(ParsedReservation {
                    reservation_id: value.to_string(),
                    pattern: DescriptionPattern::ReservationFooter,
                });
            }
        }

        if profile.is_none() {
            if let Some(value) = line.strip_prefix(PROFILE_PREFIX.trim_end()) {
                let value = value.trim();
                if is_reservation_profile(value) {
                    let pattern = if value.starts_with("Rsrv_") {
                        DescriptionPattern::ProfileReservation
                    } else {
                        DescriptionPattern::ProfileSchedule
                    };
                    profile =
                        Some(ParsedReservation { reservation_id: value.to_string(), pattern });
                }
            }
        }
    }

    profile
}

/// Reservation identity carried by a description, if any.
pub fn parse_reservation_id(description: &str) -> Option<Identity> {
    parse_description(description).map(|parsed| Identity::reservation(&parsed.reservation_id))
}

/// Footer line to append to descriptions of feed events.
pub fn reservation_footer(reservation_id: &str) -> String {
    format!("{RESERVATION_FOOTER_PREFIX}{}", reservation_id.trim())
}
