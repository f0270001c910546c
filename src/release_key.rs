/// `{component}/{component}-{version}.zip`
pub fn classic_key(component: &str, version: &str) -> String {
    format!("{component}/{component}-{version}.zip")
}

/// `{team}/{component}/{component}-{version}.zip`
pub fn team_key(team: &str, component: &str, version: &str) -> String {
    format!("{team}/{}", classic_key(component, version))
}

/// Team-scoped when a team is known, classic otherwise.
pub fn release_key(team: Option<&str>, component: &str, version: &str) -> String {
    match team {
        Some(team) => team_key(team, component, version),
        None => classic_key(component, version),
    }
}
