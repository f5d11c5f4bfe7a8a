//! Network Access Identifier construction.

use iwlan_core::Plmn;

/// Build the NAI used to authenticate to the ePDG:
/// `0<IMSI>@nai.epc.mnc<MNC>.mcc<MCC>.3gppnetwork.org`, with the MNC padded
/// to three digits. When `wifi_mac` is given (carrier opts in via
/// configuration) it is inserted before the realm, uppercased, with `:`
/// separators replaced by `-`.
pub fn build_nai(imsi: &str, plmn: &Plmn, wifi_mac: Option<&str>) -> String {
    let mut nai = String::new();
    nai.push('0');
    nai.push_str(imsi);
    nai.push('@');
    if let Some(mac) = wifi_mac {
        nai.push_str(&mac.replace(':', "-").to_uppercase());
        nai.push(':');
    }
    nai.push_str("nai.epc.mnc");
    nai.push_str(&plmn.mnc_padded());
    nai.push_str(".mcc");
    nai.push_str(plmn.mcc());
    nai.push_str(".3gppnetwork.org");
    nai
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nai_pads_two_digit_mnc() {
        let plmn = Plmn::new("310", "26").unwrap();
        assert_eq!(
            build_nai("310260123456789", &plmn, None),
            "0310260123456789@nai.epc.mnc026.mcc310.3gppnetwork.org"
        );
    }

    #[test]
    fn test_nai_with_wifi_mac() {
        let plmn = Plmn::new("311", "480").unwrap();
        assert_eq!(
            build_nai("311480123456789", &plmn, Some("aa:bb:cc:dd:ee:ff")),
            "0311480123456789@AA-BB-CC-DD-EE-FF:nai.epc.mnc480.mcc311.3gppnetwork.org"
        );
    }
}
