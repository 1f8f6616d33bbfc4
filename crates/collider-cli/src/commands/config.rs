use collider_config::{ColliderConfig, Secret};

pub fn run(config: &ColliderConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut shown = config.clone();
    if let Some(credentials) = shown.credentials.as_mut() {
        credentials.password = Secret::new("***");
    }

    // Print as YAML for readability
    let yaml = serde_yaml::to_string(&shown)?;
    println!("{}", yaml);

    Ok(())
}
