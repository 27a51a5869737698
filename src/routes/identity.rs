//! Participant identity carried in request headers.

use axum::http::HeaderMap;
use uuid::Uuid;

use crate::{error::AppError, state::identity::ClientIdentity};

pub const VOTER_ID_HEADER: &str = "x-voter-id";
/// URL-encoded so non-ASCII names survive header transport.
pub const NICKNAME_HEADER: &str = "x-nickname";
pub const TEAM_HEADER: &str = "x-team";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, AppError> {
    headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .map_err(|_| AppError::BadRequest(format!("header `{name}` is not valid text")))
        })
        .transpose()
}

/// Build the caller's identity from its parts, as sent in headers or query strings.
pub fn identity_from_parts(
    voter_id: &str,
    nickname: Option<&str>,
    team: Option<&str>,
) -> Result<ClientIdentity, AppError> {
    let voter_id = Uuid::parse_str(voter_id.trim())
        .map_err(|_| AppError::BadRequest("voter id must be a UUID".into()))?;
    let nickname = match nickname {
        Some(raw) => urlencoding::decode(raw)
            .map_err(|_| AppError::BadRequest("nickname is not valid UTF-8".into()))?
            .into_owned(),
        None => String::new(),
    };
    let team = team
        .filter(|raw| !raw.trim().is_empty())
        .map(|raw| {
            raw.trim()
                .parse::<u32>()
                .ok()
                .filter(|team| *team >= 1)
                .ok_or_else(|| AppError::BadRequest("team must be a positive number".into()))
        })
        .transpose()?;

    Ok(ClientIdentity {
        voter_id,
        nickname,
        team,
    })
}

/// Identity of a participant; the voter id header is mandatory.
pub fn participant(headers: &HeaderMap) -> Result<ClientIdentity, AppError> {
    optional_participant(headers)?.ok_or_else(|| {
        AppError::Unauthorized("missing participant header `X-Voter-Id`".into())
    })
}

/// Identity of a participant, or `None` when no voter id header was sent.
pub fn optional_participant(headers: &HeaderMap) -> Result<Option<ClientIdentity>, AppError> {
    let Some(voter_id) = header(headers, VOTER_ID_HEADER)? else {
        return Ok(None);
    };
    identity_from_parts(
        voter_id,
        header(headers, NICKNAME_HEADER)?,
        header(headers, TEAM_HEADER)?,
    )
    .map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn headers_decode_into_an_identity() {
        let voter_id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            VOTER_ID_HEADER,
            HeaderValue::from_str(&voter_id.to_string()).unwrap(),
        );
        headers.insert(NICKNAME_HEADER, HeaderValue::from_static("%EB%AF%BC%EC%95%84"));
        headers.insert(TEAM_HEADER, HeaderValue::from_static("3"));

        let identity = participant(&headers).unwrap();
        assert_eq!(identity.voter_id, voter_id);
        assert_eq!(identity.nickname, "민아");
        assert_eq!(identity.team, Some(3));
    }

    #[test]
    fn missing_voter_id_is_unauthorized() {
        assert!(matches!(
            participant(&HeaderMap::new()),
            Err(AppError::Unauthorized(_))
        ));
        assert!(optional_participant(&HeaderMap::new()).unwrap().is_none());
    }

    #[test]
    fn team_zero_is_rejected() {
        let result = identity_from_parts(&Uuid::new_v4().to_string(), None, Some("0"));
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }
}
