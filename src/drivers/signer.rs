//! Digital signature backend: an external signing toolkit for signing, the
//! poppler signature checker for validation.
//!
//! Signing shells out to pyHanko's CLI with a PEM/DER certificate and
//! private key. A key passphrase never appears on the command line; it is
//! staged in a temporary file passed by path and deleted when the handle
//! drops. Validation runs `pdfsig` and scans its report for the verdict
//! phrase — the checker's exit code does not distinguish "invalid signature"
//! from "no signature".

use crate::config::Toolchain;
use crate::driver::{DriverKind, PdfDriver, Request, SignOptions};
use crate::drivers::verify_artifact;
use crate::error::{Error, Result};
use crate::invoke::ToolCommand;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

const VALID_VERDICT: &str = "Signature is Valid.";

pub struct SignerDriver {
    signer: PathBuf,
    pdfsig: PathBuf,
    timeout: Option<Duration>,
}

impl SignerDriver {
    pub fn new(toolchain: &Toolchain) -> Self {
        SignerDriver {
            signer: toolchain.signer.clone(),
            pdfsig: toolchain.pdfsig.clone(),
            timeout: toolchain.timeout,
        }
    }
}

impl PdfDriver for SignerDriver {
    fn kind(&self) -> DriverKind {
        DriverKind::Signer
    }

    fn sign(
        &self,
        req: &Request,
        certificate: &Path,
        private_key: &Path,
        dest: &Path,
        options: &SignOptions,
    ) -> Result<()> {
        let source = req.require_source()?;
        if !certificate.is_file() {
            return Err(Error::InvalidArgument(format!(
                "certificate not found: '{}'",
                certificate.display()
            )));
        }
        if !private_key.is_file() {
            return Err(Error::InvalidArgument(format!(
                "private key not found: '{}'",
                private_key.display()
            )));
        }

        let mut cmd = ToolCommand::new(&self.signer)
            .arg("sign")
            .arg("addsig")
            .timeout(self.timeout);
        if let Some(field) = &options.field {
            cmd = cmd.arg("--field").arg(field);
        }
        cmd = cmd
            .arg("pemder")
            .arg("--key")
            .arg(private_key)
            .arg("--cert")
            .arg(certificate);

        // Staged passphrase file; dropped (deleted) on every exit path.
        let passfile = match &options.passphrase {
            Some(passphrase) => {
                let mut f = tempfile::Builder::new()
                    .prefix("conduit-pass-")
                    .tempfile()
                    .map_err(|e| Error::io("<passphrase staging>", e))?;
                f.write_all(passphrase.as_bytes())
                    .map_err(|e| Error::io(f.path(), e))?;
                f.flush().map_err(|e| Error::io(f.path(), e))?;
                cmd = cmd.arg("--passfile").arg(f.path());
                Some(f)
            }
            None => {
                cmd = cmd.arg("--no-pass");
                None
            }
        };

        cmd.arg(source).arg(dest).run_ok()?;
        drop(passfile);
        verify_artifact(dest)
    }

    fn validate(&self, req: &Request) -> Result<bool> {
        let source = req.require_source()?;
        // Probe first so a missing checker surfaces as ToolMissing rather
        // than a confusing verdict on the real run.
        ToolCommand::new(&self.pdfsig).arg("-v").run()?;

        let out = ToolCommand::new(&self.pdfsig)
            .arg(source)
            .timeout(self.timeout)
            .run()?;
        Ok(out.stdout.contains(VALID_VERDICT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_phrase_matches_checker_report() {
        let report = "\
Digital Signature Info of: signed.pdf
Signature #1:
  - Signer Certificate Common Name: Ada Lovelace
  - Signing Time: Aug 28 2026 10:12:00
  - Signature Validation: Signature is Valid.
";
        assert!(report.contains(VALID_VERDICT));
        let bad = "  - Signature Validation: Signature is Invalid.";
        assert!(!bad.contains(VALID_VERDICT));
    }
}
