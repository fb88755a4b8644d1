use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use regex::Regex;
use std::sync::OnceLock;

/// `/section.key=value` setting override.
fn override_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^/([a-z0-9_]+(?:\.[a-z0-9_]+)*)=(.+)$").expect("Invalid override regex")
    })
}

/// Command-line switches recognized at startup.
///
/// Switches are case-insensitive and accept `/x`, `-x` and `--x` forms.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StartupSwitches {
    pub no_video: bool,
    pub no_audio: bool,
    pub no_input: bool,
    pub fullscreen: bool,
    pub do_not_save_settings: bool,

    /// `key=value` setting overrides, keys in dotted form (`video.scale`)
    pub overrides: IndexMap<String, String>,

    /// First argument naming an existing file
    pub resource: Option<Utf8PathBuf>,
}

impl StartupSwitches {
    /// Parse `args` (without the program name).
    ///
    /// Relative resource paths are tried against `start_dir` as well.
    pub fn parse<S: AsRef<str>>(args: &[S], start_dir: &Utf8Path) -> Self {
        let mut switches = Self::default();

        for arg in args.iter().map(AsRef::as_ref) {
            let switch = normalize_switch(arg);
            match switch.as_str() {
                "/novideo" => switches.no_video = true,
                "/noaudio" => switches.no_audio = true,
                "/noinput" => switches.no_input = true,
                "/fullscreen" => switches.fullscreen = true,
                "/donotsavesettings" => switches.do_not_save_settings = true,
                other => {
                    if let Some(caps) = override_pattern().captures(other) {
                        switches
                            .overrides
                            .insert(caps[1].to_string(), caps[2].to_string());
                    }
                }
            }

            if switches.resource.is_none() {
                switches.resource = resolve_resource(arg, start_dir);
            }
        }

        if !switches.overrides.is_empty() {
            tracing::debug!("Command-line setting overrides: {:?}", switches.overrides);
        }
        switches
    }
}

/// Lowercase and map `--`/`-` prefixes to `/`, keeping negative values intact.
fn normalize_switch(arg: &str) -> String {
    arg.to_lowercase()
        .replace("--", "/")
        .replace('-', "/")
        .replace("=/", "=-")
}

fn resolve_resource(arg: &str, start_dir: &Utf8Path) -> Option<Utf8PathBuf> {
    let direct = Utf8PathBuf::from(arg);
    if direct.is_file() {
        return Some(direct);
    }

    let relative = start_dir.join(arg);
    relative.is_file().then_some(relative)
}
