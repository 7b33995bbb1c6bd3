
#[cfg(test)]
mod tests {
    use crate::storage::spec::{RoamingType, SplitterHandle, StorageClass, StorageSpec};

    #[test]
    fn test_roaming_type_default() {
        assert_eq!(RoamingType::default(), RoamingType::PerUser);
    }

    #[test]
    fn test_resolution_key_by_variant() {
        assert_eq!(StorageSpec::file("$ROOT$/a.json").resolution_key(), "$ROOT$/a.json");
        assert_eq!(
            StorageSpec::directory("$ROOT$/dir", SplitterHandle::new("s")).resolution_key(),
            "$ROOT$/dir"
        );
        assert_eq!(
            StorageSpec::custom("$ROOT$/a.json", StorageClass::new("remote")).resolution_key(),
            "remote"
        );
    }

    #[test]
    fn test_spec_deserializes_with_defaults() {
        let spec: StorageSpec = serde_json::from_str(r#"{"file": "$ROOT$/a.json"}"#).unwrap();
        assert_eq!(spec, StorageSpec::file("$ROOT$/a.json"));

        let spec: StorageSpec = serde_json::from_str(
            r#"{"file": "x", "variant": {"kind": "custom", "class": "remote"}, "roaming_type": "disabled"}"#,
        )
        .unwrap();
        assert_eq!(
            spec,
            StorageSpec::custom("x", StorageClass::new("remote")).with_roaming(RoamingType::Disabled)
        );
    }
}
