//! `harness_platform_secret_winrm` resource

use super::{decode_secret, delete_secret, flatten_common, read_secret, save_secret, SecretConfig};
use crate::harness::HarnessClient;
use crate::resource::{Diagnostic, Diagnostics, ImportLayout, Resource, ResourceData};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const TYPE_NAME: &str = "harness_platform_secret_winrm";
const SECRET_TYPE: &str = "WinRmCredentials";
const DEFAULT_PORT: i64 = 5985;

const KEY_TAB_METHOD: &str = "KeyTabFilePath";
const PASSWORD_METHOD: &str = "Password";

fn default_port() -> i64 {
    DEFAULT_PORT
}

#[derive(Debug, Deserialize)]
struct SecretWinRmConfig {
    #[serde(flatten)]
    common: SecretConfig,
    #[serde(default = "default_port")]
    port: i64,
    #[serde(default)]
    ntlm: Option<Vec<NtlmBlock>>,
    #[serde(default)]
    kerberos: Option<Vec<KerberosBlock>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct NtlmBlock {
    domain: String,
    username: String,
    password_ref: String,
    #[serde(default)]
    use_ssl: bool,
    #[serde(default)]
    skip_cert_checks: bool,
    #[serde(default)]
    use_no_profile: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct KeyTabBlock {
    key_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct TgtPasswordBlock {
    password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct KerberosBlock {
    principal: String,
    realm: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tgt_key_tab_file_path_spec: Option<Vec<KeyTabBlock>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tgt_password_spec: Option<Vec<TgtPasswordBlock>>,
    #[serde(default)]
    use_ssl: bool,
    #[serde(default)]
    skip_cert_checks: bool,
    #[serde(default)]
    use_no_profile: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WinRmSpec {
    #[serde(default = "default_port")]
    port: i64,
    auth: WinRmAuth,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "spec")]
enum WinRmAuth {
    #[serde(rename = "NTLM")]
    Ntlm(NtlmSpec),
    Kerberos(KerberosSpec),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NtlmSpec {
    domain: String,
    username: String,
    /// Secret reference holding the password
    password: String,
    #[serde(rename = "useSSL", default)]
    use_ssl: bool,
    #[serde(default)]
    skip_cert_checks: bool,
    #[serde(default)]
    use_no_profile: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KerberosSpec {
    principal: String,
    realm: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tgt_generation_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    spec: Option<TgtSpec>,
    #[serde(rename = "useSSL", default)]
    use_ssl: bool,
    #[serde(default)]
    skip_cert_checks: bool,
    #[serde(default)]
    use_no_profile: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TgtSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    password: Option<String>,
}

impl From<NtlmBlock> for NtlmSpec {
    fn from(b: NtlmBlock) -> Self {
        Self {
            domain: b.domain,
            username: b.username,
            password: b.password_ref,
            use_ssl: b.use_ssl,
            skip_cert_checks: b.skip_cert_checks,
            use_no_profile: b.use_no_profile,
        }
    }
}

impl TryFrom<KerberosBlock> for KerberosSpec {
    type Error = Diagnostics;

    fn try_from(b: KerberosBlock) -> Result<Self, Diagnostics> {
        let key_tab = b.tgt_key_tab_file_path_spec.and_then(|v| v.into_iter().next());
        let password = b.tgt_password_spec.and_then(|v| v.into_iter().next());

        let (method, spec) = match (key_tab, password) {
            (Some(_), Some(_)) => {
                return Err(Diagnostics::from(
                    Diagnostic::error("Only one TGT generation method can be set")
                        .with_detail("Set either tgt_key_tab_file_path_spec or tgt_password_spec")
                        .with_attribute("kerberos"),
                ))
            }
            (Some(k), None) => (
                Some(KEY_TAB_METHOD.to_string()),
                Some(TgtSpec {
                    key_path: Some(k.key_path),
                    ..Default::default()
                }),
            ),
            (None, Some(p)) => (
                Some(PASSWORD_METHOD.to_string()),
                Some(TgtSpec {
                    password: Some(p.password),
                    ..Default::default()
                }),
            ),
            (None, None) => (None, None),
        };

        Ok(Self {
            principal: b.principal,
            realm: b.realm,
            tgt_generation_method: method,
            spec,
            use_ssl: b.use_ssl,
            skip_cert_checks: b.skip_cert_checks,
            use_no_profile: b.use_no_profile,
        })
    }
}

impl From<KerberosSpec> for KerberosBlock {
    fn from(s: KerberosSpec) -> Self {
        let tgt = s.spec.unwrap_or_default();
        let (key_tab, password) = match s.tgt_generation_method.as_deref() {
            Some(KEY_TAB_METHOD) => (
                tgt.key_path.map(|key_path| vec![KeyTabBlock { key_path }]),
                None,
            ),
            Some(PASSWORD_METHOD) => (
                None,
                tgt.password.map(|password| vec![TgtPasswordBlock { password }]),
            ),
            _ => (None, None),
        };
        Self {
            principal: s.principal,
            realm: s.realm,
            tgt_key_tab_file_path_spec: key_tab,
            tgt_password_spec: password,
            use_ssl: s.use_ssl,
            skip_cert_checks: s.skip_cert_checks,
            use_no_profile: s.use_no_profile,
        }
    }
}

/// Exactly one authentication scheme must be configured
fn build_auth(ntlm: Option<Vec<NtlmBlock>>, kerberos: Option<Vec<KerberosBlock>>) -> Result<WinRmAuth, Diagnostics> {
    let ntlm = ntlm.and_then(|v| v.into_iter().next());
    let kerberos = kerberos.and_then(|v| v.into_iter().next());

    match (ntlm, kerberos) {
        (Some(n), None) => Ok(WinRmAuth::Ntlm(n.into())),
        (None, Some(k)) => Ok(WinRmAuth::Kerberos(k.try_into()?)),
        _ => Err(Diagnostics::from(
            Diagnostic::error("Exactly one of ntlm or kerberos must be set")
                .with_detail("A WinRM credential authenticates with a single scheme"),
        )),
    }
}

#[derive(Debug, Serialize)]
struct SecretWinRmState {
    port: i64,
    ntlm: Option<Vec<NtlmBlock>>,
    kerberos: Option<Vec<KerberosBlock>>,
}

fn flatten(d: &mut ResourceData, secret: Value) -> Result<(), Diagnostics> {
    let spec: WinRmSpec = flatten_common(d, decode_secret(secret, SECRET_TYPE)?)?;
    let (ntlm, kerberos) = match spec.auth {
        WinRmAuth::Ntlm(n) => (
            Some(vec![NtlmBlock {
                domain: n.domain,
                username: n.username,
                password_ref: n.password,
                use_ssl: n.use_ssl,
                skip_cert_checks: n.skip_cert_checks,
                use_no_profile: n.use_no_profile,
            }]),
            None,
        ),
        WinRmAuth::Kerberos(k) => (None, Some(vec![KerberosBlock::from(k)])),
    };
    d.apply(&SecretWinRmState {
        port: spec.port,
        ntlm,
        kerberos,
    })
}

async fn create_or_update(client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
    let config: SecretWinRmConfig = d.decode()?;
    let spec = WinRmSpec {
        port: config.port,
        auth: build_auth(config.ntlm, config.kerberos)?,
    };
    let secret = config.common.into_secret(SECRET_TYPE, spec);
    let saved = save_secret(client, d, &secret).await?;
    flatten(d, saved)
}

pub struct SecretWinRmResource;

#[async_trait]
impl Resource for SecretWinRmResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn import_layout(&self) -> ImportLayout {
        ImportLayout::MultiLevel
    }

    async fn create(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        create_or_update(client, d).await
    }

    async fn read(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        match read_secret(client, d).await? {
            Some(secret) => flatten(d, secret),
            None => Ok(()),
        }
    }

    async fn update(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        create_or_update(client, d).await
    }

    async fn delete(&self, client: &HarnessClient, d: &mut ResourceData) -> Result<(), Diagnostics> {
        delete_secret(client, d).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kerberos(key_tab: bool, password: bool) -> KerberosBlock {
        KerberosBlock {
            principal: "svc".into(),
            realm: "CORP.LOCAL".into(),
            tgt_key_tab_file_path_spec: key_tab.then(|| vec![KeyTabBlock { key_path: "/etc/krb5.keytab".into() }]),
            tgt_password_spec: password.then(|| vec![TgtPasswordBlock { password: "account.krb".into() }]),
            use_ssl: true,
            skip_cert_checks: false,
            use_no_profile: true,
        }
    }

    #[test]
    fn test_ntlm_request_body() {
        let config: SecretWinRmConfig = serde_json::from_value(json!({
            "identifier": "winrm",
            "name": "winrm",
            "ntlm": [{"domain": "corp", "username": "admin", "password_ref": "account.pw", "use_ssl": true}]
        }))
        .unwrap();
        assert_eq!(config.port, 5985);

        let spec = WinRmSpec {
            port: config.port,
            auth: build_auth(config.ntlm, config.kerberos).unwrap(),
        };
        let body = serde_json::to_value(config.common.into_secret(SECRET_TYPE, spec)).unwrap();
        assert_eq!(body["type"], json!("WinRmCredentials"));
        assert_eq!(body["spec"]["auth"]["type"], json!("NTLM"));
        assert_eq!(body["spec"]["auth"]["spec"]["password"], json!("account.pw"));
        assert_eq!(body["spec"]["auth"]["spec"]["useSSL"], json!(true));
    }

    #[test]
    fn test_kerberos_tgt_method_follows_block() {
        let key_tab = KerberosSpec::try_from(kerberos(true, false)).unwrap();
        assert_eq!(key_tab.tgt_generation_method.as_deref(), Some("KeyTabFilePath"));
        let body = serde_json::to_value(&key_tab).unwrap();
        assert_eq!(body["spec"], json!({"keyPath": "/etc/krb5.keytab"}));

        let password = KerberosSpec::try_from(kerberos(false, true)).unwrap();
        assert_eq!(password.tgt_generation_method.as_deref(), Some("Password"));

        let err = KerberosSpec::try_from(kerberos(true, true)).unwrap_err();
        assert!(err.to_string().contains("Only one TGT generation method"));
    }

    #[test]
    fn test_auth_scheme_is_required() {
        assert!(build_auth(None, None).is_err());
        assert!(build_auth(Some(vec![]), None).is_err());

        let ntlm = NtlmBlock {
            domain: "corp".into(),
            username: "admin".into(),
            password_ref: "account.pw".into(),
            use_ssl: false,
            skip_cert_checks: false,
            use_no_profile: false,
        };
        assert!(build_auth(Some(vec![ntlm]), Some(vec![kerberos(true, false)])).is_err());
    }

    #[test]
    fn test_flatten_switches_scheme() {
        let mut d = ResourceData::default();
        d.set(
            "ntlm",
            json!([{"domain": "corp", "username": "admin", "password_ref": "account.pw"}]),
        );

        flatten(
            &mut d,
            json!({
                "type": "WinRmCredentials",
                "identifier": "winrm",
                "name": "winrm",
                "spec": {
                    "port": 5986,
                    "auth": {
                        "type": "Kerberos",
                        "spec": {
                            "principal": "svc",
                            "realm": "CORP.LOCAL",
                            "tgtGenerationMethod": "Password",
                            "spec": {"password": "account.krb"},
                            "useSSL": true
                        }
                    }
                }
            }),
        )
        .unwrap();

        assert!(d.get("ntlm").is_none());
        assert_eq!(d.get("port"), Some(&json!(5986)));
        let kerberos = &d.get("kerberos").unwrap()[0];
        assert_eq!(kerberos["tgt_password_spec"], json!([{"password": "account.krb"}]));
        assert!(kerberos.get("tgt_key_tab_file_path_spec").is_none());
        assert_eq!(kerberos["use_ssl"], json!(true));
    }

    #[test]
    fn test_other_secret_kinds_are_rejected() {
        let mut d = ResourceData::default();
        let err = flatten(
            &mut d,
            json!({"type": "SecretText", "identifier": "t", "name": "t", "spec": {}}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("expected WinRmCredentials"));
    }
}
