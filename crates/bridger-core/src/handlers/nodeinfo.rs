//! NODEINFO_APP handler. Grounded on `bridger/mesh/handlers/nodeinfo.py`.

use prost::Message;

use super::HandlerOptions;
use crate::error::ProcessingError;
use crate::model::{Header, NodeInfoPoint, TypedPoint};
use crate::proto::User;

/// Always emits exactly one point; a NodeInfo payload has no optional half.
pub fn handle(
    header: &Header,
    payload: &[u8],
    _opts: &HandlerOptions,
) -> Result<Option<Vec<TypedPoint>>, ProcessingError> {
    let user = User::decode(payload)
        .map_err(|e| ProcessingError::new(format!("malformed NodeInfo payload: {e}"), None))?;

    Ok(Some(vec![TypedPoint::NodeInfo(NodeInfoPoint {
        header: header.clone(),
        long_name: user.long_name,
        short_name: user.short_name,
        hw_model: user.hw_model,
        role: user.role,
        id: user.id,
    })]))
}
