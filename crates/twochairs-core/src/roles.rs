use serde::{Deserialize, Serialize};

/// Who wrote a message. Users write as `Self_` or `Monster`; `Angel` is the
/// generated counselor reply that closes a round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(rename = "self")]
    Self_,
    Monster,
    Angel,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Self_ => "self",
            Self::Monster => "monster",
            Self::Angel => "angel",
        }
    }

    /// Roles a client may submit.
    pub fn is_user_role(&self) -> bool {
        matches!(self, Self::Self_ | Self::Monster)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "self" => Ok(Self::Self_),
            "monster" => Ok(Self::Monster),
            "angel" => Ok(Self::Angel),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display_agree() {
        for role in [Role::Self_, Role::Monster, Role::Angel] {
            let parsed: Role = role.to_string().parse().unwrap();
            assert_eq!(parsed, role);
        }
    }

    #[test]
    fn unknown_role_rejected() {
        assert!("critic".parse::<Role>().is_err());
        assert!("Self".parse::<Role>().is_err());
    }

    #[test]
    fn serde_uses_lowercase_names() {
        assert_eq!(serde_json::to_string(&Role::Self_).unwrap(), r#""self""#);
        let parsed: Role = serde_json::from_str(r#""monster""#).unwrap();
        assert_eq!(parsed, Role::Monster);
    }

    #[test]
    fn only_self_and_monster_are_user_roles() {
        assert!(Role::Self_.is_user_role());
        assert!(Role::Monster.is_user_role());
        assert!(!Role::Angel.is_user_role());
    }
}
