/*!
# Educafric DevKit - Doubles de test pour les services de connectivité

Permet de jouer les scénarios scheduler, heartbeat et adapter sans serveur :
- Transport HTTP scripté qui enregistre chaque requête
- Runtime scriptable (visibilité, lien réseau, batterie, snapshot plateforme)
- Horloge manuelle
- Harness de test qui branche tout ça sur les vrais services
*/

pub mod manual_clock;
pub mod mock_runtime;
pub mod mock_transport;
pub mod test_utils;

pub use manual_clock::ManualClock;
pub use mock_runtime::MockRuntime;
pub use mock_transport::{MockReply, MockTransport, RecordedRequest};
pub use test_utils::TestHarness;
