//! PLMN and tracking-area identity types.
//!
//! Kept as digit strings rather than packed BCD: every consumer here is an
//! FQDN or NAI builder, and 3GPP TS 23.003 spells both out digit by digit.

use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PlmnError {
    #[error("invalid MCC: {0:?}")]
    InvalidMcc(String),
    #[error("invalid MNC: {0:?}")]
    InvalidMnc(String),
    #[error("invalid MCC-MNC pair: {0:?}")]
    InvalidPair(String),
}

/// Public land mobile network identity (MCC + MNC).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Plmn {
    mcc: String,
    mnc: String,
}

impl Plmn {
    /// Build from MCC (3 digits) and MNC (2 or 3 digits).
    pub fn new(mcc: &str, mnc: &str) -> Result<Self, PlmnError> {
        if mcc.len() != 3 || !mcc.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PlmnError::InvalidMcc(mcc.to_string()));
        }
        if !(mnc.len() == 2 || mnc.len() == 3) || !mnc.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PlmnError::InvalidMnc(mnc.to_string()));
        }
        Ok(Plmn {
            mcc: mcc.to_string(),
            mnc: mnc.to_string(),
        })
    }

    /// Parse the `"<MCC>-<MNC>"` form used by the carrier MCC/MNC list.
    pub fn from_dashed_pair(pair: &str) -> Result<Self, PlmnError> {
        let (mcc, mnc) = pair
            .split_once('-')
            .ok_or_else(|| PlmnError::InvalidPair(pair.to_string()))?;
        Plmn::new(mcc.trim(), mnc.trim()).map_err(|_| PlmnError::InvalidPair(pair.to_string()))
    }

    pub fn mcc(&self) -> &str {
        &self.mcc
    }

    pub fn mnc(&self) -> &str {
        &self.mnc
    }

    /// MNC left-padded to three digits, as every 3GPP FQDN label requires.
    pub fn mnc_padded(&self) -> String {
        if self.mnc.len() == 2 {
            format!("0{}", self.mnc)
        } else {
            self.mnc.clone()
        }
    }

    /// ePDG FQDN in the operator-identifier form of TS 23.003 §19.4.2.4:
    /// `epdg.epc.mnc<MNC>.mcc<MCC>.pub.3gppnetwork.org`.
    pub fn epdg_fqdn(&self) -> String {
        format!(
            "epdg.epc.mnc{}.mcc{}.pub.3gppnetwork.org",
            self.mnc_padded(),
            self.mcc
        )
    }
}

impl fmt::Display for Plmn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.mcc, self.mnc)
    }
}

/// Tracking area identity: serving PLMN plus 16-bit tracking area code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tai {
    pub plmn: Plmn,
    pub tac: u16,
}

impl Tai {
    pub fn new(plmn: Plmn, tac: u16) -> Self {
        Tai { plmn, tac }
    }

    /// Tracking-area ePDG FQDN per TS 23.003 §19.4.2.9:
    /// `tac-lb<low byte>.tac-hb<high byte>.tac.epdg.epc.mnc<MNC>.mcc<MCC>.pub.3gppnetwork.org`.
    pub fn epdg_fqdn(&self) -> String {
        format!(
            "tac-lb{:02x}.tac-hb{:02x}.tac.epdg.epc.mnc{}.mcc{}.pub.3gppnetwork.org",
            self.tac & 0xff,
            self.tac >> 8,
            self.plmn.mnc_padded(),
            self.plmn.mcc()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plmn_validation() {
        assert!(Plmn::new("310", "260").is_ok());
        assert!(Plmn::new("310", "26").is_ok());
        assert_eq!(
            Plmn::new("31", "260"),
            Err(PlmnError::InvalidMcc("31".to_string()))
        );
        assert_eq!(
            Plmn::new("310", "2"),
            Err(PlmnError::InvalidMnc("2".to_string()))
        );
        assert!(Plmn::new("31a", "260").is_err());
    }

    #[test]
    fn test_two_digit_mnc_is_padded() {
        let plmn = Plmn::new("310", "26").unwrap();
        assert_eq!(plmn.mnc_padded(), "026");
        assert_eq!(
            plmn.epdg_fqdn(),
            "epdg.epc.mnc026.mcc310.pub.3gppnetwork.org"
        );
    }

    #[test]
    fn test_three_digit_mnc_unchanged() {
        let plmn = Plmn::new("311", "480").unwrap();
        assert_eq!(
            plmn.epdg_fqdn(),
            "epdg.epc.mnc480.mcc311.pub.3gppnetwork.org"
        );
    }

    #[test]
    fn test_dashed_pair_parsing() {
        let plmn = Plmn::from_dashed_pair("310-210").unwrap();
        assert_eq!(plmn.mcc(), "310");
        assert_eq!(plmn.mnc(), "210");
        assert!(Plmn::from_dashed_pair("310210").is_err());
        assert!(Plmn::from_dashed_pair("310-").is_err());
    }

    #[test]
    fn test_tai_fqdn_splits_tac_bytes() {
        let tai = Tai::new(Plmn::new("262", "02").unwrap(), 0x1234);
        assert_eq!(
            tai.epdg_fqdn(),
            "tac-lb34.tac-hb12.tac.epdg.epc.mnc002.mcc262.pub.3gppnetwork.org"
        );
    }
}
