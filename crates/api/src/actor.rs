//! Staff identity forwarded by the upstream authentication layer.

use axum::http::HeaderMap;
use common::StaffId;
use domain::{Capability, Role};

use crate::error::ApiError;

pub const STAFF_ID_HEADER: &str = "x-staff-id";
pub const STAFF_ROLE_HEADER: &str = "x-staff-role";

/// The staff member making a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub staff_id: StaffId,
    pub role: Role,
}

/// Reads the actor from the request headers and checks `capability`.
///
/// A missing or malformed identity is `401`, a role without the capability
/// is `403`.
pub fn authorize(headers: &HeaderMap, capability: Capability) -> Result<Actor, ApiError> {
    let staff_id = header(headers, STAFF_ID_HEADER)?
        .parse::<i64>()
        .map(StaffId::new)
        .map_err(|_| ApiError::Unauthorized(format!("Invalid {STAFF_ID_HEADER} header.")))?;
    let role: Role = header(headers, STAFF_ROLE_HEADER)?.parse()?;

    role.require(capability)?;
    Ok(Actor { staff_id, role })
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, ApiError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Unauthorized(format!("Missing {name} header.")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(id: &str, role: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(STAFF_ID_HEADER, HeaderValue::from_str(id).unwrap());
        headers.insert(STAFF_ROLE_HEADER, HeaderValue::from_str(role).unwrap());
        headers
    }

    #[test]
    fn cashier_may_place_orders() {
        let actor = authorize(&headers("7", "cashier"), Capability::PlaceOrder).unwrap();
        assert_eq!(actor.staff_id, StaffId::new(7));
        assert_eq!(actor.role, Role::Cashier);
    }

    #[test]
    fn kitchen_may_not_place_orders() {
        let err = authorize(&headers("8", "kitchen"), Capability::PlaceOrder).unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    #[test]
    fn missing_or_bad_identity_is_unauthorized() {
        let err = authorize(&HeaderMap::new(), Capability::ViewOrder).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));

        let err = authorize(&headers("seven", "cashier"), Capability::ViewOrder).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));

        let err = authorize(&headers("7", "owner"), Capability::ViewOrder).unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }
}
