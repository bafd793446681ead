//! One-time ethernet controller: runs once at startup, matching
//! `ControlEthernetPower.py` — if the cable isn't plugged in, power the
//! interface off for good (there's no controller tick to bring it back).

/// True iff ethernet power should be turned off, given `ifconfig eth0`'s
/// output.
pub fn wants_power_off(ifconfig_output: &str) -> bool {
    !ifconfig_output.contains("RUNNING")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaves_power_on_when_link_is_running() {
        assert!(!wants_power_off("eth0: flags=... RUNNING MULTICAST"));
    }

    #[test]
    fn turns_power_off_when_link_is_not_running() {
        assert!(wants_power_off("eth0: flags=... MULTICAST"));
    }
}
