use crate::adb::Adb;

/// The devices attached when a session started.
///
/// The list is computed once and handed to whatever needs it, nothing
/// re-enumerates devices behind the session's back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceRegistry {
    devices: Vec<String>,
}

impl DeviceRegistry {
    /// Enumerate the devices with the given (unscoped) adb
    pub fn enumerate(adb: &dyn Adb) -> crate::Result<Self> {
        let devices = adb.get_connected_devices()?;
        log::debug!("found {} attached device(s): {:?}", devices.len(), devices);
        Ok(Self { devices })
    }

    pub fn from_devices(devices: Vec<String>) -> Self {
        Self { devices }
    }

    pub fn devices(&self) -> &[String] {
        &self.devices
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn contains(&self, serial: &str) -> bool {
        self.devices.iter().any(|it| it == serial)
    }

    pub fn first(&self) -> Option<&str> {
        self.devices.first().map(String::as_str)
    }

    /// Pick the device to run against.
    ///
    /// A requested device that isn't attached falls back to the first
    /// attached device with a warning. `None` only if nothing is attached.
    pub fn select(&self, requested: Option<&str>) -> Option<&str> {
        match requested {
            Some(serial) if self.contains(serial) => {
                self.devices.iter().find(|it| *it == serial).map(String::as_str)
            }
            Some(serial) => {
                let first = self.first()?;
                log::warn!("device {} is not attached, using {} instead", serial, first);
                Some(first)
            }
            None => self.first(),
        }
    }
}

#[cfg(test)]
mod test {
    use crate::testing::{mock_adb, MockAdb};

    use super::*;
    use rstest::*;

    fn registry() -> DeviceRegistry {
        DeviceRegistry::from_devices(vec!["emulator-5554".into(), "R58M1234XYZ".into()])
    }

    #[rstest]
    fn test_enumerate(mut mock_adb: MockAdb) {
        mock_adb
            .expect_get_connected_devices()
            .times(1)
            .returning(|| Ok(vec!["emulator-5554".into()]));
        let reg = DeviceRegistry::enumerate(&mock_adb).expect("enumerate");
        assert_eq!(reg.devices(), &["emulator-5554".to_string()]);
        assert!(!reg.is_empty());
    }

    #[rstest]
    fn test_enumerate_empty_is_not_an_error(mut mock_adb: MockAdb) {
        mock_adb
            .expect_get_connected_devices()
            .returning(|| Ok(Vec::new()));
        let reg = DeviceRegistry::enumerate(&mock_adb).expect("enumerate");
        assert!(reg.is_empty());
        assert_eq!(reg.select(None), None);
        assert_eq!(reg.select(Some("emulator-5554")), None);
    }

    #[rstest]
    fn test_enumerate_propagates_command_failures(mut mock_adb: MockAdb) {
        mock_adb.expect_get_connected_devices().returning(|| {
            Err(crate::Error::Command {
                code: 1,
                stderr: "adb server didn't ACK".into(),
            })
        });
        assert!(DeviceRegistry::enumerate(&mock_adb).is_err());
    }

    #[rstest]
    #[case(None, Some("emulator-5554"))]
    #[case(Some("R58M1234XYZ"), Some("R58M1234XYZ"))]
    #[case(Some("not-attached"), Some("emulator-5554"))]
    fn test_select(#[case] requested: Option<&str>, #[case] expected: Option<&str>) {
        assert_eq!(registry().select(requested), expected);
    }
}
