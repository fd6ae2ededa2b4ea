//! 오케스트레이션 매니페스트(compose 파일) 정적 검증

use serde::Serialize;
use serde_yaml::{Mapping, Value};

use crate::error::DeployError;

/// 유효한 매니페스트가 선언한 내용
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ManifestSummary {
    pub services: Vec<String>,
    pub volumes: Vec<String>,
    pub networks: Vec<String>,
    /// `external: true`로 선언된 볼륨 이름 (`name:` 반영)
    pub external_volumes: Vec<String>,
    /// 명시적 태그가 없거나 `latest`를 쓰는 서비스
    pub unpinned_images: Vec<String>,
}

/// 매니페스트를 파싱하고 필수 섹션과 서비스를 검사합니다.
///
/// 누락된 섹션과 서비스를 모두 보고합니다. 서비스는 `services` 키가 있을 때만
/// 검사하며, 값이 비어 있거나 매핑이 아니면 어떤 서비스도 정의되지 않은
/// 것으로 봅니다.
pub fn validate_manifest(
    raw: &str,
    required_sections: &[String],
    required_services: &[String],
) -> Result<ManifestSummary, DeployError> {
    let doc: Value =
        serde_yaml::from_str(raw).map_err(|e| DeployError::Manifest(format!("invalid YAML: {e}")))?;
    let root = doc
        .as_mapping()
        .ok_or_else(|| DeployError::Manifest("top level must be a mapping".to_owned()))?;

    let missing_sections: Vec<String> = required_sections
        .iter()
        .filter(|s| !root.contains_key(s.as_str()))
        .cloned()
        .collect();

    let services = section(root, "services");
    let missing_services: Vec<String> = match (root.get("services"), services) {
        (None, _) => Vec::new(),
        (Some(_), Some(map)) => required_services
            .iter()
            .filter(|s| !map.contains_key(s.as_str()))
            .cloned()
            .collect(),
        // 키는 있으나 비어 있거나 매핑이 아님: 정의된 서비스 없음
        (Some(_), None) => required_services.to_vec(),
    };

    if !missing_sections.is_empty() || !missing_services.is_empty() {
        return Err(DeployError::ManifestInvalid {
            missing_sections,
            missing_services,
        });
    }

    let volumes = section(root, "volumes");
    Ok(ManifestSummary {
        services: keys(services),
        volumes: keys(volumes),
        networks: keys(section(root, "networks")),
        external_volumes: external_volumes(volumes),
        unpinned_images: unpinned_images(services),
    })
}

/// 이미지 참조에 `latest`가 아닌 명시적 태그나 다이제스트가 있으면 `true`
pub fn is_pinned_image(image: &str) -> bool {
    if image.contains('@') {
        return true;
    }
    // 마지막 '/' 앞의 ':'는 태그가 아니라 레지스트리 포트
    let last = image.rsplit('/').next().unwrap_or(image);
    match last.rsplit_once(':') {
        Some((_, tag)) => !tag.is_empty() && tag != "latest",
        None => false,
    }
}

fn section<'a>(root: &'a Mapping, name: &str) -> Option<&'a Mapping> {
    root.get(name).and_then(Value::as_mapping)
}

fn keys(map: Option<&Mapping>) -> Vec<String> {
    map.map(|m| {
        m.keys()
            .filter_map(|k| k.as_str().map(str::to_owned))
            .collect()
    })
    .unwrap_or_default()
}

fn external_volumes(volumes: Option<&Mapping>) -> Vec<String> {
    let Some(volumes) = volumes else {
        return Vec::new();
    };
    volumes
        .iter()
        .filter_map(|(key, spec)| {
            let key = key.as_str()?;
            let spec = spec.as_mapping()?;
            let external = spec.get("external")?;
            let is_external = match external {
                Value::Bool(b) => *b,
                // 구형식: `external: { name: x }`
                Value::Mapping(_) => true,
                _ => false,
            };
            if !is_external {
                return None;
            }
            let name = spec
                .get("name")
                .and_then(Value::as_str)
                .or_else(|| {
                    external
                        .as_mapping()
                        .and_then(|m| m.get("name"))
                        .and_then(Value::as_str)
                })
                .unwrap_or(key);
            Some(name.to_owned())
        })
        .collect()
}

fn unpinned_images(services: Option<&Mapping>) -> Vec<String> {
    let Some(services) = services else {
        return Vec::new();
    };
    services
        .iter()
        .filter_map(|(name, spec)| {
            let image = spec.as_mapping()?.get("image")?.as_str()?;
            if is_pinned_image(image) {
                None
            } else {
                name.as_str().map(str::to_owned)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    fn required() -> (Vec<String>, Vec<String>) {
        (
            owned(&["services", "volumes", "networks"]),
            owned(&["synapse", "postgres", "element", "coturn"]),
        )
    }

    const VALID: &str = r#"
services:
  synapse:
    image: matrixdotorg/synapse:v1.98.0
  postgres:
    image: postgres:15-alpine
  element:
    image: vectorim/element-web:latest
  coturn:
    image: coturn/coturn
volumes:
  postgres_data:
    external: true
    name: voice-stack_postgres_data
  synapse_data:
    external: true
  scratch: {}
networks:
  matrix: {}
"#;

    #[test]
    fn valid_manifest_summary() {
        let (sections, services) = required();
        let summary = validate_manifest(VALID, &sections, &services).unwrap();
        assert_eq!(summary.services, owned(&["synapse", "postgres", "element", "coturn"]));
        assert_eq!(summary.volumes, owned(&["postgres_data", "synapse_data", "scratch"]));
        assert_eq!(summary.networks, owned(&["matrix"]));
        assert_eq!(
            summary.external_volumes,
            owned(&["voice-stack_postgres_data", "synapse_data"])
        );
        assert_eq!(summary.unpinned_images, owned(&["element", "coturn"]));
    }

    #[test]
    fn missing_volumes_section_is_reported_exactly() {
        let raw = r#"
services:
  synapse: {image: "a:1"}
  postgres: {image: "b:1"}
  element: {image: "c:1"}
  coturn: {image: "d:1"}
networks:
  matrix: {}
"#;
        let (sections, services) = required();
        let err = validate_manifest(raw, &sections, &services).unwrap_err();
        assert_eq!(err.missing(), vec!["volumes".to_owned()]);
    }

    #[test]
    fn missing_services_are_listed() {
        let raw = "services:\n  synapse: {}\n  element: {}\nvolumes: {}\nnetworks: {}\n";
        let (sections, services) = required();
        let err = validate_manifest(raw, &sections, &services).unwrap_err();
        assert_eq!(err.missing(), owned(&["postgres", "coturn"]));
    }

    #[test]
    fn empty_services_section_misses_every_service() {
        let raw = "services:\nvolumes: {}\nnetworks: {}\n";
        let (sections, services) = required();
        let err = validate_manifest(raw, &sections, &services).unwrap_err();
        assert_eq!(err.missing(), services);
    }

    #[test]
    fn services_as_list_misses_every_service() {
        let raw = "services: [synapse, postgres, element, coturn]\nvolumes: {}\nnetworks: {}\n";
        let (sections, services) = required();
        let err = validate_manifest(raw, &sections, &services).unwrap_err();
        assert_eq!(err.missing(), services);
    }

    #[test]
    fn absent_services_section_reports_only_the_section() {
        let raw = "volumes: {}\nnetworks: {}\n";
        let (sections, services) = required();
        let err = validate_manifest(raw, &sections, &services).unwrap_err();
        assert_eq!(err.missing(), owned(&["services"]));
    }

    #[test]
    fn malformed_yaml_is_a_manifest_error() {
        let (sections, services) = required();
        let err = validate_manifest("services: [unclosed", &sections, &services).unwrap_err();
        assert!(matches!(err, DeployError::Manifest(_)));
    }

    #[test]
    fn non_mapping_root_is_rejected() {
        let (sections, services) = required();
        let err = validate_manifest("- a\n- b\n", &sections, &services).unwrap_err();
        assert!(matches!(err, DeployError::Manifest(_)));
    }

    #[test]
    fn image_pinning_rules() {
        assert!(is_pinned_image("postgres:15"));
        assert!(is_pinned_image("registry.local:5000/synapse:v1.98.0"));
        assert!(is_pinned_image("redis@sha256:abcdef"));
        assert!(!is_pinned_image("coturn/coturn"));
        assert!(!is_pinned_image("nginx:latest"));
        assert!(!is_pinned_image("registry.local:5000/synapse"));
    }
}
