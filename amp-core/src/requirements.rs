//! Image requirements against platform provisions.

use std::collections::BTreeSet;

use amp_types::{AgentContainer, AgentContainerImage};

use crate::config::PlatformConfig;
use crate::error::{PlatformError, Result};

/// Everything this platform currently provides.
///
/// Configured provisions, the platform settings and, per running container,
/// its image, the image's own provisions, agent types and action names.
pub fn provisions(config: &PlatformConfig, containers: &[AgentContainer]) -> BTreeSet<String> {
    let mut provided: BTreeSet<String> = config.provides.iter().cloned().collect();
    provided.insert(format!("config:container-env={}", config.container_environment));
    provided.insert(format!("config:enable-auth={}", config.enable_auth));

    for container in containers {
        provided.insert(format!("image:{}", container.image.image_name));
        provided.extend(container.image.provides.iter().cloned());
        for agent in &container.agents {
            if let Some(agent_type) = &agent.agent_type {
                provided.insert(format!("agent:{}", agent_type));
            }
            for action in &agent.actions {
                provided.insert(format!("action:{}", action.name));
            }
        }
    }
    provided
}

/// Fail with `InvalidInput` naming every unmet requirement.
pub fn check_requirements(image: &AgentContainerImage, provided: &BTreeSet<String>) -> Result<()> {
    let missing: Vec<&str> = image
        .requires
        .iter()
        .filter(|req| !provided.contains(req.as_str()))
        .map(String::as_str)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(PlatformError::invalid_input(format!(
            "Image {} has unmet requirements: {}",
            image.image_name,
            missing.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amp_types::{Action, AgentDescription};

    #[test]
    fn test_provisions_include_containers() {
        let mut config = PlatformConfig::default();
        config.provides = vec!["gpu".to_string()];

        let mut image = AgentContainerImage::new("registry/llm:1");
        image.provides = vec!["llm".to_string()];
        let container = AgentContainer::new("c1", image).with_agent(
            AgentDescription::new("a1", "translator").with_action(Action::new("translate")),
        );

        let provided = provisions(&config, &[container]);
        for expected in [
            "gpu",
            "llm",
            "image:registry/llm:1",
            "agent:translator",
            "action:translate",
            "config:container-env=DOCKER",
            "config:enable-auth=false",
        ] {
            assert!(provided.contains(expected), "missing {}", expected);
        }
    }

    #[test]
    fn test_unmet_requirements() {
        let provided = provisions(&PlatformConfig::default(), &[]);
        let mut image = AgentContainerImage::new("needs-gpu");
        image.requires = vec!["gpu".to_string(), "config:container-env=DOCKER".to_string()];

        let err = check_requirements(&image, &provided).unwrap_err();
        match err {
            PlatformError::InvalidInput(msg) => {
                assert!(msg.contains("gpu"));
                assert!(!msg.contains("container-env"));
            }
            other => panic!("unexpected error: {:?}", other),
        }

        image.requires = vec!["config:container-env=DOCKER".to_string()];
        assert!(check_requirements(&image, &provided).is_ok());
    }
}
