use mcsc_model::LaunchArguments;

use crate::{
    error::{Result, ServerError},
    layout::server_jar_name,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub exec: String,
    pub args: Vec<String>,
}

impl LaunchSpec {
    pub fn command_line(&self) -> String {
        let mut out = self.exec.clone();
        for a in &self.args {
            out.push(' ');
            out.push_str(a);
        }
        out
    }
}

pub fn validate_arguments(args: &LaunchArguments) -> Result<()> {
    if args.memory_start == 0 || args.memory_max == 0 {
        return Err(ServerError::InvalidArguments(
            "memoryStart and memoryMax must be greater than 0".to_string(),
        ));
    }
    if args.memory_start > args.memory_max {
        return Err(ServerError::InvalidArguments(format!(
            "memoryStart ({}G) exceeds memoryMax ({}G)",
            args.memory_start, args.memory_max
        )));
    }
    Ok(())
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().filter(|s| !s.is_empty())
}

/// Full argv for the server: runtime first, then the fixed JVM/jar segment,
/// then optional server flags in the order the server documents them.
pub fn build_command_line(runtime: &str, version: &str, args: &LaunchArguments) -> Vec<String> {
    let mut out = vec![
        runtime.to_string(),
        format!("-Xms{}G", args.memory_start),
        format!("-Xmx{}G", args.memory_max),
        "-jar".to_string(),
        server_jar_name(version),
        "--nogui".to_string(),
    ];

    for (on, flag) in [
        (args.bonus_chest, "--bonusChest"),
        (args.demo, "--demo"),
        (args.erase_cache, "--eraseCache"),
        (args.force_upgrade, "--forceUpgrade"),
        (args.safe_mode, "--safeMode"),
    ] {
        if on {
            out.push(flag.to_string());
        }
    }

    for (value, flag) in [
        (non_empty(&args.server_id), "--serverId"),
        (non_empty(&args.single_player), "--singleplayer"),
        (non_empty(&args.universe), "--universe"),
        (non_empty(&args.world), "--world"),
    ] {
        if let Some(v) = value {
            out.push(flag.to_string());
            out.push(v.to_string());
        }
    }

    if let Some(port) = args.port.filter(|p| *p > 0) {
        out.push("--port".to_string());
        out.push(port.to_string());
    }

    out
}

pub fn resolve_launch_spec(
    runtime: &str,
    version: &str,
    args: &LaunchArguments,
) -> Result<LaunchSpec> {
    validate_arguments(args)?;
    let mut argv = build_command_line(runtime, version, args);
    let exec = argv.remove(0);
    Ok(LaunchSpec { exec, args: argv })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_have_no_optional_flags() {
        let argv = build_command_line("java", "1.20.6", &LaunchArguments::default());
        assert_eq!(
            argv,
            strings(&["java", "-Xms1G", "-Xmx2G", "-jar", "server-1.20.6.jar", "--nogui"])
        );
    }

    #[test]
    fn all_optional_flags_in_fixed_order() {
        let args = LaunchArguments {
            memory_start: 1,
            memory_max: 2,
            bonus_chest: true,
            demo: true,
            erase_cache: true,
            force_upgrade: true,
            safe_mode: true,
            server_id: Some("server_id".to_string()),
            single_player: Some("single_and_pringle".to_string()),
            universe: Some("world".to_string()),
            world: Some("a_world".to_string()),
            port: Some(1000),
        };
        let argv = build_command_line("java", "1.20.6", &args);
        assert_eq!(
            argv,
            strings(&[
                "java",
                "-Xms1G",
                "-Xmx2G",
                "-jar",
                "server-1.20.6.jar",
                "--nogui",
                "--bonusChest",
                "--demo",
                "--eraseCache",
                "--forceUpgrade",
                "--safeMode",
                "--serverId",
                "server_id",
                "--singleplayer",
                "single_and_pringle",
                "--universe",
                "world",
                "--world",
                "a_world",
                "--port",
                "1000",
            ])
        );
    }

    #[test]
    fn empty_values_and_zero_port_are_skipped() {
        let args = LaunchArguments {
            server_id: Some(String::new()),
            single_player: Some(String::new()),
            universe: Some(String::new()),
            world: Some(String::new()),
            port: Some(0),
            ..LaunchArguments::default()
        };
        assert_eq!(build_command_line("java", "1.20.6", &args).len(), 6);
    }

    #[test]
    fn rejects_zero_and_inverted_memory_bounds() {
        let zero = LaunchArguments {
            memory_start: 0,
            ..LaunchArguments::default()
        };
        assert!(matches!(
            validate_arguments(&zero),
            Err(ServerError::InvalidArguments(_))
        ));

        let inverted = LaunchArguments {
            memory_start: 8,
            memory_max: 4,
            ..LaunchArguments::default()
        };
        let err = resolve_launch_spec("java", "1.20.6", &inverted).unwrap_err();
        assert!(err.to_string().contains("exceeds memoryMax"));
    }

    #[test]
    fn launch_spec_splits_runtime() {
        let spec = resolve_launch_spec("/usr/bin/java", "1.20.4", &LaunchArguments::default())
            .unwrap();
        assert_eq!(spec.exec, "/usr/bin/java");
        assert_eq!(spec.args[0], "-Xms1G");
        assert_eq!(
            spec.command_line(),
            "/usr/bin/java -Xms1G -Xmx2G -jar server-1.20.4.jar --nogui"
        );
    }
}
