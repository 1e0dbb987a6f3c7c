//! Ordered trigger table mapping chat messages to snippets.

use regex::Regex;

use playpen_core::config::BotConfig;
use playpen_core::types::ReleaseChannel;
use playpen_core::{Error, Result};
use playpen_pipeline::{RenderMode, TemplateRenderer};

/// Capture group holding the snippet. Falls back to the first group.
pub const CODE_GROUP: &str = "code";

pub struct Trigger {
    regex: Regex,
    channel: ReleaseChannel,
    mode: RenderMode,
}

impl Trigger {
    pub fn new(pattern: &str, channel: ReleaseChannel, mode: RenderMode) -> Result<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| Error::config(format!("Invalid trigger pattern {:?}: {}", pattern, e)))?;
        if regex.captures_len() < 2 {
            return Err(Error::config(format!(
                "Trigger pattern {:?} has no capture group for the code",
                pattern
            )));
        }
        Ok(Self {
            regex,
            channel,
            mode,
        })
    }

    fn capture<'t>(&self, message: &'t str) -> Option<&'t str> {
        let captures = self.regex.captures(message)?;
        captures
            .name(CODE_GROUP)
            .or_else(|| captures.get(1))
            .map(|m| m.as_str())
    }
}

/// What to run for a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerMatch<'a> {
    pub code: &'a str,
    pub channel: ReleaseChannel,
    pub mode: &'a RenderMode,
}

pub struct TriggerRouter {
    triggers: Vec<Trigger>,
    default_channel: ReleaseChannel,
    default_mode: RenderMode,
}

impl TriggerRouter {
    pub fn new(triggers: Vec<Trigger>, default_channel: ReleaseChannel, default_mode: RenderMode) -> Self {
        Self {
            triggers,
            default_channel,
            default_mode,
        }
    }

    /// Compile the configured triggers. Custom scaffolds are registered with
    /// `renderer` under a per-trigger name.
    pub fn from_config(config: &BotConfig, renderer: &mut TemplateRenderer) -> Result<Self> {
        let mut triggers = Vec::with_capacity(config.triggers.len());
        for (index, trigger) in config.triggers.iter().enumerate() {
            let mode = match &trigger.template {
                Some(body) => {
                    let name = format!("trigger-{}", index);
                    renderer.register(&name, body)?;
                    RenderMode::Template(name)
                }
                None if trigger.render => RenderMode::wrapped(),
                None => RenderMode::Verbatim,
            };
            triggers.push(Trigger::new(&trigger.pattern, trigger.channel, mode)?);
        }

        let default_mode = if config.default_render {
            RenderMode::wrapped()
        } else {
            RenderMode::Verbatim
        };
        Ok(Self::new(triggers, config.default_channel, default_mode))
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    /// First matching trigger wins. A direct message that matches nothing
    /// is taken whole with the default channel and mode.
    pub fn route<'a>(&'a self, message: &'a str, direct: bool) -> Option<TriggerMatch<'a>> {
        for trigger in &self.triggers {
            if let Some(code) = trigger.capture(message) {
                return Some(TriggerMatch {
                    code,
                    channel: trigger.channel,
                    mode: &trigger.mode,
                });
            }
        }

        let code = message.trim();
        (direct && !code.is_empty()).then_some(TriggerMatch {
            code,
            channel: self.default_channel,
            mode: &self.default_mode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playpen_core::config::TriggerConfig;

    fn default_router() -> TriggerRouter {
        let mut renderer = TemplateRenderer::new().unwrap();
        TriggerRouter::from_config(&BotConfig::default(), &mut renderer).unwrap()
    }

    #[test]
    fn test_default_triggers() {
        let router = default_router();
        assert_eq!(router.len(), 4);

        let m = router.route("playbot: 1 + 1", false).unwrap();
        assert_eq!(m.code, "1 + 1");
        assert_eq!(m.channel, ReleaseChannel::Stable);
        assert_eq!(m.mode, &RenderMode::wrapped());

        let m = router.route("playbot-mini, fn main() {}", false).unwrap();
        assert_eq!(m.code, "fn main() {}");
        assert_eq!(m.mode, &RenderMode::Verbatim);

        let m = router.route("playbot-nightly: ()", false).unwrap();
        assert_eq!(m.channel, ReleaseChannel::Nightly);
    }

    #[test]
    fn test_first_match_wins() {
        let a = Trigger::new(r"^!(?P<code>.+)$", ReleaseChannel::Beta, RenderMode::Verbatim).unwrap();
        let b = Trigger::new(r"^!(.+)$", ReleaseChannel::Nightly, RenderMode::wrapped()).unwrap();
        let router = TriggerRouter::new(vec![a, b], ReleaseChannel::Stable, RenderMode::wrapped());

        let m = router.route("!x", false).unwrap();
        assert_eq!(m.channel, ReleaseChannel::Beta);
        assert_eq!(m.code, "x");
    }

    #[test]
    fn test_unmatched_messages() {
        let router = default_router();
        assert_eq!(router.route("hello there", false), None);

        let m = router.route("  vec![1, 2]  ", true).unwrap();
        assert_eq!(m.code, "vec![1, 2]");
        assert_eq!(m.channel, ReleaseChannel::Stable);
        assert_eq!(m.mode, &RenderMode::wrapped());

        assert_eq!(router.route("   ", true), None);
    }

    #[test]
    fn test_custom_template_is_registered() {
        let config = BotConfig {
            triggers: vec![TriggerConfig {
                pattern: r"^run: (.+)$".into(),
                channel: ReleaseChannel::Beta,
                render: false,
                template: Some("fn main() { {{ code }} }".into()),
            }],
            ..BotConfig::default()
        };
        let mut renderer = TemplateRenderer::new().unwrap();
        let router = TriggerRouter::from_config(&config, &mut renderer).unwrap();

        assert!(renderer.has_template("trigger-0"));
        let m = router.route("run: let x = 1;", false).unwrap();
        assert_eq!(m.mode, &RenderMode::Template("trigger-0".into()));
    }

    #[test]
    fn test_pattern_without_group_rejected() {
        assert!(Trigger::new(r"^playbot: .+$", ReleaseChannel::Stable, RenderMode::Verbatim).is_err());
        assert!(Trigger::new(r"^(unclosed", ReleaseChannel::Stable, RenderMode::Verbatim).is_err());
    }
}
