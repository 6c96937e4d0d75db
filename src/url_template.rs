//! Widget URL template expansion (spec §6.5).
//!
//! Explicitly a non-core collaborator (spec §1): a pure function with no
//! capability checks and no access to [`crate::state_machine::MachineState`],
//! kept in its own module so it can't be mistaken for part of the reducer.
//! Grounded on the teacher's `widget::WidgetSettings::get_url`, which does
//! the same `str::replace` chain over a much smaller variable table, and
//! `WidgetSettings::new_virtual_element_call_widget`, which validates the
//! resulting string with `url::Url::parse` rather than handing back a bare
//! `String`.

use url::Url;
use urlencoding::encode;

/// One `$variable` substitution. Values are URL-component encoded before
/// being substituted (spec §6.5).
#[derive(Clone, Copy, Debug)]
pub struct TemplateVar<'a> {
    pub name: &'a str,
    pub value: &'a str,
}

/// The full variable table recognized by widget URL templates (spec §6.5).
#[derive(Clone, Debug, Default)]
pub struct TemplateContext<'a> {
    pub matrix_user_id: Option<&'a str>,
    pub matrix_room_id: Option<&'a str>,
    pub matrix_widget_id: Option<&'a str>,
    pub matrix_avatar_url: Option<&'a str>,
    pub matrix_display_name: Option<&'a str>,
    pub client_language: Option<&'a str>,
    pub client_theme: Option<&'a str>,
    pub client_id: Option<&'a str>,
    pub matrix_device_id: Option<&'a str>,
    pub matrix_base_url: Option<&'a str>,
    pub font_scale: Option<&'a str>,
    pub font: Option<&'a str>,
}

impl<'a> TemplateContext<'a> {
    /// The `$variable -> value` pairs to substitute, in the order spec §6.5
    /// lists them. Variables whose value is `None` are left untouched in the
    /// template, matching the teacher's behaviour of only replacing what it
    /// was given.
    fn vars(&self) -> Vec<TemplateVar<'a>> {
        let mut vars = Vec::new();
        let mut push = |name: &'static str, value: Option<&'a str>| {
            if let Some(value) = value {
                vars.push(TemplateVar { name, value });
            }
        };

        push("$matrix_user_id", self.matrix_user_id);
        push("$matrix_room_id", self.matrix_room_id);
        push("$matrix_widget_id", self.matrix_widget_id);
        push("$matrix_avatar_url", self.matrix_avatar_url);
        push("$matrix_display_name", self.matrix_display_name);
        push("$org.matrix.msc2873.client_language", self.client_language);
        push("$org.matrix.msc2873.client_theme", self.client_theme);
        push("$org.matrix.msc2873.client_id", self.client_id);
        push("$org.matrix.msc2873.matrix_device_id", self.matrix_device_id);
        push("$org.matrix.msc4039.matrix_base_url", self.matrix_base_url);
        push("$io.element.fontScale", self.font_scale);
        push("$io.element.font", self.font);
        vars
    }
}

/// Expands every recognized `$variable` in `template` against `ctx`,
/// URL-component encoding each substituted value (spec §6.5), then validates
/// the result parses as a URL -- matching the teacher's
/// `WidgetSettings::new_virtual_element_call_widget`, which rejects a
/// malformed `raw_url` at construction time rather than handing the widget a
/// string that only looks like a URL.
pub fn expand(template: &str, ctx: &TemplateContext<'_>) -> Result<Url, url::ParseError> {
    let mut out = template.to_owned();
    for var in ctx.vars() {
        out = out.replace(var.name, &encode(var.value));
    }
    Url::parse(&out)
}
