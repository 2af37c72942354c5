//! Validation functions for configuration values.
//!
//! Provides custom validation functions for directories and for the names of
//! hosts, volumes and devices, which end up inside file names.

use validator::ValidationError;

use std::path::Path;

static LOWER: &str = "abcdefghijklmnopqrstuvwxyz";
static UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
static DIGIT: &str = "0123456789";

/// Characters allowed in a device or volume name besides letters and digits
pub static DEVICE_EXTRA: &str = "_.";
/// Characters allowed in a host name besides letters and digits
pub static HOST_EXTRA: &str = ".";

fn is_valid_name(name: &str, extra: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| LOWER.contains(c) || UPPER.contains(c) || DIGIT.contains(c) || extra.contains(c))
}

fn validate_name(name: &str, extra: &str, code: &'static str) -> Result<(), ValidationError> {
    if is_valid_name(name, extra) {
        Ok(())
    } else {
        Err(ValidationError::new(code).with_message(
            format!("Invalid name {name:?}, use letters, digits and {extra:?}").into(),
        ))
    }
}

pub fn validate_device_name<S: AsRef<str>>(name: S) -> Result<(), ValidationError> {
    validate_name(name.as_ref(), DEVICE_EXTRA, "InvalidDeviceName")
}

pub fn validate_volume_name<S: AsRef<str>>(name: S) -> Result<(), ValidationError> {
    validate_name(name.as_ref(), DEVICE_EXTRA, "InvalidVolumeName")
}

pub fn validate_host_name<S: AsRef<str>>(name: S) -> Result<(), ValidationError> {
    validate_name(name.as_ref(), HOST_EXTRA, "InvalidHostName")
}

pub fn validate_device_names<I>(names: I) -> Result<(), ValidationError>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    names.into_iter().try_for_each(validate_device_name)
}

pub fn validate_dir_exist_or_created<P: AsRef<Path>>(dir: P) -> Result<(), ValidationError> {
    let dir = dir.as_ref();
    if dir.exists() {
        if !dir.is_dir() {
            return Err(ValidationError::new("InvalidDirectory")
                .with_message(format!("{:?} is not a directory", dir).into()));
        }
    } else {
        return std::fs::create_dir_all(dir).map_err(|e| {
            ValidationError::new("InvalidDirectory").with_message(
                format!("cannot create or access log path {:?}: {}", dir, e).into(),
            )
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_names() {
        assert!(validate_device_name("usb_disk.1").is_ok());
        assert!(validate_volume_name("home").is_ok());
        assert!(validate_host_name("www.example.com").is_ok());

        assert!(validate_device_name("").is_err());
        assert!(validate_device_name("usb-disk").is_err());
        assert!(validate_volume_name("a/b").is_err());
        assert!(validate_host_name("my_host").is_err());
        assert!(validate_device_names(["ok", "not ok"]).is_err());
    }

    #[test]
    fn test_dir_validation() {
        let temp_dir = TempDir::new().unwrap();
        assert!(validate_dir_exist_or_created(temp_dir.path()).is_ok());

        let missing = temp_dir.path().join("logs");
        assert!(validate_dir_exist_or_created(&missing).is_ok());
        assert!(missing.is_dir());

        let file = temp_dir.path().join("file");
        std::fs::write(&file, "").unwrap();
        assert!(validate_dir_exist_or_created(&file).is_err());
    }
}
