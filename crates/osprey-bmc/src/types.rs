//! Desired-state and device-state types for account and LDAP reconciliation
//!
//! The wire-facing structs carry serde renames so serialized payloads match
//! the vendor's attribute registry exactly.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BmcError, Result};

/// Account role understood by the reconciler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

/// Vendor privilege pair a role maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrivilegeMap {
    /// Numeric privilege bitmask, as the string the device expects
    pub privilege: &'static str,
    /// IPMI-over-LAN privilege level
    pub ipmi_lan_privilege: &'static str,
}

impl Role {
    /// Role-to-privilege mapping table. New roles are additive here, never
    /// inline literals at call sites.
    pub fn privileges(&self) -> PrivilegeMap {
        match self {
            Role::Admin => PrivilegeMap {
                privilege: "511",
                ipmi_lan_privilege: "Administrator",
            },
            Role::User => PrivilegeMap {
                privilege: "499",
                ipmi_lan_privilege: "Operator",
            },
        }
    }

    pub fn parse(name: &str) -> Result<Role> {
        match name {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(BmcError::ValidationFailed(format!(
                "unknown role {other:?}, expected \"admin\" or \"user\""
            ))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::User => write!(f, "user"),
        }
    }
}

/// Attribute value the vendor uses for boolean switches
pub fn enable_str(enabled: bool) -> &'static str {
    if enabled {
        "Enabled"
    } else {
        "Disabled"
    }
}

/// One desired local account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesiredUser {
    pub name: String,
    pub password: String,
    pub role: Role,
    pub enable: bool,
}

impl DesiredUser {
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(BmcError::ValidationFailed(
                "user entry with empty name".to_string(),
            ));
        }
        if self.password.is_empty() {
            return Err(BmcError::ValidationFailed(format!(
                "user {:?} has an empty password",
                self.name
            )));
        }
        Ok(())
    }
}

/// Validate a whole batch before anything is written
pub fn validate_users(desired: &[DesiredUser]) -> Result<()> {
    for user in desired {
        user.validate()?;
    }
    Ok(())
}

/// Current state of one vendor account slot, as read from the device
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UserSlot {
    #[serde(rename = "UserName", default)]
    pub username: String,
    #[serde(rename = "Enable", default)]
    pub enable: String,
    #[serde(rename = "Privilege", default)]
    pub privilege: String,
    #[serde(rename = "IpmiLanPrivilege", default)]
    pub ipmi_lan_privilege: String,
    #[serde(rename = "SolEnable", default)]
    pub sol_enable: String,
    #[serde(rename = "ProtocolEnable", default)]
    pub protocol_enable: String,
}

impl UserSlot {
    pub fn is_enabled(&self) -> bool {
        self.enable == "Enabled"
    }

    /// A free slot has an empty username
    pub fn is_free(&self) -> bool {
        self.username.is_empty()
    }
}

/// Wire body for one account slot write
#[derive(Debug, Clone, Serialize)]
pub struct UserAttributes {
    #[serde(rename = "UserName")]
    pub user_name: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "Enable")]
    pub enable: String,
    #[serde(rename = "Privilege")]
    pub privilege: String,
    #[serde(rename = "IpmiLanPrivilege")]
    pub ipmi_lan_privilege: String,
    #[serde(rename = "SolEnable")]
    pub sol_enable: String,
    #[serde(rename = "ProtocolEnable")]
    pub protocol_enable: String,
    #[serde(rename = "AuthenticationProtocol")]
    pub authentication_protocol: String,
    #[serde(rename = "PrivacyProtocol")]
    pub privacy_protocol: String,
}

/// `{"iDRAC.Users": {...}}` envelope, addressed to `...iDRAC.Users.<slot>`
#[derive(Debug, Clone, Serialize)]
pub struct UserPayload {
    #[serde(rename = "iDRAC.Users")]
    pub user: UserAttributes,
}

impl UserPayload {
    pub fn for_user(desired: &DesiredUser) -> Self {
        let privileges = desired.role.privileges();
        Self {
            user: UserAttributes {
                user_name: desired.name.clone(),
                password: desired.password.clone(),
                enable: enable_str(desired.enable).to_string(),
                privilege: privileges.privilege.to_string(),
                ipmi_lan_privilege: privileges.ipmi_lan_privilege.to_string(),
                sol_enable: enable_str(desired.enable).to_string(),
                protocol_enable: enable_str(desired.enable).to_string(),
                authentication_protocol: "SHA".to_string(),
                privacy_protocol: "AES".to_string(),
            },
        }
    }
}

/// Current state of one LDAP role-group slot
///
/// A disabled group is a tombstone (DN `""`, privilege `"0"`) left in place
/// on the device, not a removed record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LdapRoleGroup {
    #[serde(rename = "DN", default)]
    pub dn: String,
    #[serde(rename = "Privilege", default)]
    pub privilege: String,
}

impl LdapRoleGroup {
    pub fn new(dn: impl Into<String>, privilege: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            privilege: privilege.into(),
        }
    }

    /// The blank-out payload that stands in for deletion on this vendor
    pub fn tombstone() -> Self {
        Self {
            dn: String::new(),
            privilege: "0".to_string(),
        }
    }

    pub fn is_tombstone(&self) -> bool {
        self.dn.is_empty() && self.privilege == "0"
    }

    /// A slot is free once its DN is blank
    pub fn is_free(&self) -> bool {
        self.dn.is_empty()
    }
}

/// `{"iDRAC.LDAPRoleGroup": {...}}` envelope, addressed to
/// `...iDRAC.LDAPRoleGroup.<role>`
#[derive(Debug, Clone, Serialize)]
pub struct LdapRoleGroupPayload {
    #[serde(rename = "iDRAC.LDAPRoleGroup")]
    pub group: LdapRoleGroup,
}

/// One desired LDAP role group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LdapRoleGroupCfg {
    /// Distinguished name of the directory group
    pub group_dn: String,
    pub role: Role,
    pub enable: bool,
}

impl LdapRoleGroupCfg {
    fn validate(&self) -> Result<()> {
        if self.group_dn.is_empty() {
            return Err(BmcError::ValidationFailed(
                "ldap role group with empty DN".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn validate_ldap_groups(desired: &[LdapRoleGroupCfg]) -> Result<()> {
    for group in desired {
        group.validate()?;
    }
    Ok(())
}

/// Directory-service settings for the device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LdapConfig {
    pub enable: bool,
    pub server: String,
    pub base_dn: String,
    pub user_attribute: String,
    pub group_attribute: String,
}

impl LdapConfig {
    pub fn validate(&self) -> Result<()> {
        if self.server.is_empty() {
            return Err(BmcError::ValidationFailed(
                "ldap config requires a server".to_string(),
            ));
        }
        if self.base_dn.is_empty() {
            return Err(BmcError::ValidationFailed(
                "ldap config requires a base DN".to_string(),
            ));
        }
        Ok(())
    }
}

/// `{"iDRAC.LDAP": {...}}` envelope for directory settings
#[derive(Debug, Clone, Serialize)]
pub struct LdapAttributes {
    #[serde(rename = "Enable")]
    pub enable: String,
    #[serde(rename = "Server")]
    pub server: String,
    #[serde(rename = "BaseDN")]
    pub base_dn: String,
    #[serde(rename = "UserAttribute")]
    pub user_attribute: String,
    #[serde(rename = "GroupAttribute")]
    pub group_attribute: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LdapPayload {
    #[serde(rename = "iDRAC.LDAP")]
    pub ldap: LdapAttributes,
}

impl LdapPayload {
    pub fn from_config(config: &LdapConfig) -> Self {
        Self {
            ldap: LdapAttributes {
                enable: enable_str(config.enable).to_string(),
                server: config.server.clone(),
                base_dn: config.base_dn.clone(),
                user_attribute: config.user_attribute.clone(),
                group_attribute: config.group_attribute.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_privilege_mapping() {
        assert_eq!(Role::Admin.privileges().privilege, "511");
        assert_eq!(Role::Admin.privileges().ipmi_lan_privilege, "Administrator");
        assert_eq!(Role::User.privileges().privilege, "499");
        assert_eq!(Role::User.privileges().ipmi_lan_privilege, "Operator");
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("admin").unwrap(), Role::Admin);
        assert_eq!(Role::parse("user").unwrap(), Role::User);
        assert!(matches!(
            Role::parse("operator"),
            Err(BmcError::ValidationFailed(_))
        ));
    }

    #[test]
    fn test_user_validation() {
        let user = DesiredUser {
            name: "alice".to_string(),
            password: "p".to_string(),
            role: Role::Admin,
            enable: true,
        };
        assert!(user.validate().is_ok());

        let nameless = DesiredUser {
            name: String::new(),
            ..user.clone()
        };
        assert!(matches!(
            nameless.validate(),
            Err(BmcError::ValidationFailed(_))
        ));

        let passwordless = DesiredUser {
            password: String::new(),
            ..user
        };
        assert!(matches!(
            passwordless.validate(),
            Err(BmcError::ValidationFailed(_))
        ));
    }

    #[test]
    fn test_user_payload_wire_shape() {
        let desired = DesiredUser {
            name: "alice".to_string(),
            password: "p".to_string(),
            role: Role::Admin,
            enable: true,
        };
        let value = serde_json::to_value(UserPayload::for_user(&desired)).unwrap();
        let user = &value["iDRAC.Users"];
        assert_eq!(user["UserName"], "alice");
        assert_eq!(user["Password"], "p");
        assert_eq!(user["Enable"], "Enabled");
        assert_eq!(user["Privilege"], "511");
        assert_eq!(user["IpmiLanPrivilege"], "Administrator");
        assert_eq!(user["SolEnable"], "Enabled");
    }

    #[test]
    fn test_user_slot_deserializes_sparse_attributes() {
        let slot: UserSlot = serde_json::from_str(r#"{"UserName": "", "Enable": "Disabled"}"#).unwrap();
        assert!(slot.is_free());
        assert!(!slot.is_enabled());
    }

    #[test]
    fn test_ldap_tombstone_shape() {
        let tombstone = LdapRoleGroup::tombstone();
        assert!(tombstone.is_tombstone());
        assert!(tombstone.is_free());

        let value = serde_json::to_value(LdapRoleGroupPayload {
            group: tombstone,
        })
        .unwrap();
        assert_eq!(value["iDRAC.LDAPRoleGroup"]["DN"], "");
        assert_eq!(value["iDRAC.LDAPRoleGroup"]["Privilege"], "0");
    }

    #[test]
    fn test_ldap_config_validation() {
        let config = LdapConfig {
            enable: true,
            server: "ldap.corp.example".to_string(),
            base_dn: "dc=corp,dc=example".to_string(),
            user_attribute: "uid".to_string(),
            group_attribute: "memberUid".to_string(),
        };
        assert!(config.validate().is_ok());

        let no_server = LdapConfig {
            server: String::new(),
            ..config.clone()
        };
        assert!(no_server.validate().is_err());

        let no_base = LdapConfig {
            base_dn: String::new(),
            ..config
        };
        assert!(no_base.validate().is_err());
    }
}
