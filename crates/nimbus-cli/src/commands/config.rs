use nimbus_core::NimbusConfig;

pub fn show(config: &NimbusConfig) -> anyhow::Result<()> {
    print!("{}", config.to_toml_string()?);
    Ok(())
}
