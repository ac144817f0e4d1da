//! Boot command template interpolation contract.
//!
//! The full configuration template engine is an external collaborator; boot
//! commands only ever see the fixed variable set below. [`BasicRenderer`]
//! implements that narrow contract so the crate is usable stand-alone, and
//! callers embedding a richer engine implement [`TemplateRenderer`]
//! themselves.

use crate::error::{ForgeError, ForgeResult};

/// Variables available to boot command templates.
#[derive(Debug, Clone)]
pub struct BootTemplateData {
    /// Host address the guest can reach the seed-file HTTP server on.
    pub http_ip: String,
    /// Bound port of the seed-file HTTP server.
    pub http_port: u16,
    /// Configured VM name.
    pub name: String,
    /// SSH public key for the communicator, empty when not generated.
    pub ssh_public_key: String,
}

pub trait TemplateRenderer: Send + Sync {
    /// Render a boot command template. Failure aborts the remaining script.
    fn render(&self, template: &str, data: &BootTemplateData) -> ForgeResult<String>;
}

/// Renderer for the `{{ .Var }}` forms of the fixed boot command variables.
pub struct BasicRenderer;

impl TemplateRenderer for BasicRenderer {
    fn render(&self, template: &str, data: &BootTemplateData) -> ForgeResult<String> {
        let vars = [
            ("HTTPIP", data.http_ip.clone()),
            ("HTTPPort", data.http_port.to_string()),
            ("Name", data.name.clone()),
            ("SSHPublicKey", data.ssh_public_key.clone()),
        ];

        let mut out = template.to_string();
        for (name, value) in &vars {
            out = out.replace(&format!("{{{{ .{name} }}}}"), value);
            out = out.replace(&format!("{{{{.{name}}}}}"), value);
        }

        if out.contains("{{") {
            return Err(ForgeError::Template(format!(
                "unresolved template token in boot command: {out}"
            )));
        }
        Ok(out)
    }
}
