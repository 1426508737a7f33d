// ABOUTME: Integration tests for validated identifiers.
// ABOUTME: Tests image reference parsing, registry retargeting, and release name rules.

use rollout::types::*;

mod image_ref_tests {
    use super::*;

    #[test]
    fn parse_simple_name() {
        let img = ImageRef::parse("nginx").unwrap();
        assert_eq!(img.name(), "nginx");
        assert_eq!(img.tag(), Some("latest"));
        assert!(img.registry().is_none());
        assert!(img.digest().is_none());
    }

    #[test]
    fn parse_name_with_tag() {
        let img = ImageRef::parse("demo-app:1.4.0").unwrap();
        assert_eq!(img.name(), "demo-app");
        assert_eq!(img.tag(), Some("1.4.0"));
    }

    #[test]
    fn parse_with_org() {
        let img = ImageRef::parse("ghcr.io/org/repo:latest").unwrap();
        assert_eq!(img.registry(), Some("ghcr.io"));
        assert_eq!(img.name(), "org/repo");
        assert_eq!(img.repository(), "ghcr.io/org/repo");
    }

    #[test]
    fn parse_registry_with_port() {
        let img = ImageRef::parse("localhost:5000/demo-app").unwrap();
        assert_eq!(img.registry(), Some("localhost:5000"));
        assert_eq!(img.name(), "demo-app");
        assert_eq!(img.tag(), Some("latest"));
    }

    #[test]
    fn parse_full_reference() {
        let img = ImageRef::parse("ghcr.io/org/repo:v1@sha256:abc123").unwrap();
        assert_eq!(img.tag(), Some("v1"));
        assert_eq!(img.digest(), Some("sha256:abc123"));
        assert_eq!(img.to_string(), "ghcr.io/org/repo:v1@sha256:abc123");
    }

    #[test]
    fn parse_invalid_returns_error() {
        assert!(ImageRef::parse("").is_err());
        assert!(ImageRef::parse("invalid image!").is_err());
        assert!(ImageRef::parse("ghcr.io/").is_err());
    }

    #[test]
    fn retarget_to_repository_location_keeps_tag() {
        let img = ImageRef::parse("demo-app:1.4.0").unwrap();
        let target = img
            .retarget("123456789012.dkr.ecr.eu-west-1.amazonaws.com/orders/")
            .unwrap();
        assert_eq!(
            target.to_string(),
            "123456789012.dkr.ecr.eu-west-1.amazonaws.com/orders:1.4.0"
        );
    }

    #[test]
    fn retarget_to_bare_host_keeps_name() {
        let img = ImageRef::parse("demo-app:2.0.0@sha256:abc").unwrap();
        let target = img.retarget("registry.example.com").unwrap();
        assert_eq!(target.registry(), Some("registry.example.com"));
        assert_eq!(target.name(), "demo-app");
        assert!(target.digest().is_none());
        assert_eq!(target.to_string(), "registry.example.com/demo-app:2.0.0");
    }
}

mod release_name_tests {
    use super::*;

    #[test]
    fn valid_name() {
        let name = ReleaseName::new("demo-app").unwrap();
        assert_eq!(name.as_str(), "demo-app");
        assert_eq!(
            name.instance_selector(),
            "app.kubernetes.io/instance=demo-app"
        );
    }

    #[test]
    fn empty_returns_error() {
        assert!(matches!(ReleaseName::new(""), Err(ReleaseNameError::Empty)));
    }

    #[test]
    fn too_long_returns_error() {
        assert!(ReleaseName::new(&"a".repeat(54)).is_err());
        assert!(ReleaseName::new(&"a".repeat(53)).is_ok());
    }

    #[test]
    fn hyphen_at_either_end_returns_error() {
        assert!(ReleaseName::new("-app").is_err());
        assert!(ReleaseName::new("app-").is_err());
    }

    #[test]
    fn uppercase_returns_error() {
        assert!(matches!(
            ReleaseName::new("DemoApp"),
            Err(ReleaseNameError::NotLowercase)
        ));
    }

    #[test]
    fn underscore_returns_error() {
        assert!(matches!(
            ReleaseName::new("demo_app"),
            Err(ReleaseNameError::InvalidChar('_'))
        ));
    }
}
