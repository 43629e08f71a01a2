use std::sync::Arc;

use proptest::prelude::*;

use crate::errors::GovernanceError;
use crate::gateway::{decode_proposal, ContractGateway, RawProposal, SigningCaller, ViewCaller};
use crate::testing::{addr, proposal, MockChain, MockWalletProvider};
use crate::types::{Address, TxState, VoteChoice, Word};

fn raw(id: u64, start: u64, end: u64, yes: u128, no: u128, abstain: u128) -> RawProposal {
    RawProposal {
        id: Word::from_u64(id),
        proposer: addr(0x11),
        start: Word::from_u64(start),
        end: Word::from_u64(end),
        metadata_uri: "ipfs://qm".to_string(),
        yes: Word::from_u128(yes),
        no: Word::from_u128(no),
        abstain: Word::from_u128(abstain),
        executed: false,
    }
}

fn signing_gateway(chain: &Arc<MockChain>, account: Address) -> ContractGateway {
    let views: Arc<dyn ViewCaller> = chain.clone();
    let signer: Arc<dyn SigningCaller> = chain.signer(account);
    ContractGateway::new(chain.dao(), views, Some(signer))
}

#[test]
fn decode_reproduces_every_field() {
    let mut input = raw(7, 100, 200, 3, 1, 2);
    input.executed = true;
    let decoded = decode_proposal(input).unwrap();
    assert_eq!(decoded.id, 7);
    assert_eq!(decoded.proposer, addr(0x11));
    assert_eq!(decoded.start, 100);
    assert_eq!(decoded.end, 200);
    assert_eq!(decoded.metadata_uri, "ipfs://qm");
    assert_eq!((decoded.yes, decoded.no, decoded.abstain), (3, 1, 2));
    assert!(decoded.executed);
}

#[test]
fn decode_rejects_oversized_words() {
    let mut input = raw(1, 0, 1, 0, 0, 0);
    input.start = Word::from_u128(u64::MAX as u128 + 1);
    assert!(matches!(
        decode_proposal(input),
        Err(GovernanceError::ReadFailed(_))
    ));

    let mut input = raw(1, 0, 1, 0, 0, 0);
    input.yes = Word([0xff; 32]);
    assert!(matches!(
        decode_proposal(input),
        Err(GovernanceError::ReadFailed(_))
    ));
}

#[test]
fn decode_rejects_inverted_window() {
    assert!(matches!(
        decode_proposal(raw(1, 200, 100, 0, 0, 0)),
        Err(GovernanceError::ReadFailed(_))
    ));
}

proptest! {
    // Every numeric field survives the wire representation exactly
    #[test]
    fn decode_is_lossless(
        id in any::<u64>(),
        offset in any::<u32>(),
        start in any::<u64>(),
        yes in any::<u128>(),
        no in any::<u128>(),
        abstain in any::<u128>(),
    ) {
        let end = start.saturating_add(offset as u64);
        let decoded = decode_proposal(raw(id, start, end, yes, no, abstain)).unwrap();
        prop_assert_eq!(decoded.id, id);
        prop_assert_eq!(decoded.start, start);
        prop_assert_eq!(decoded.end, end);
        prop_assert_eq!(decoded.yes, yes);
        prop_assert_eq!(decoded.no, no);
        prop_assert_eq!(decoded.abstain, abstain);
        // And re-encodes to the identical words
        prop_assert_eq!(Word::from_u64(decoded.id), Word::from_u64(id));
        prop_assert_eq!(Word::from_u128(decoded.yes), Word::from_u128(yes));
    }
}

#[tokio::test]
async fn list_ids_decodes_words() {
    let chain = MockChain::new(addr(0xda));
    chain.seed(proposal(3, addr(1)));
    chain.seed(proposal(1, addr(1)));
    let gateway = ContractGateway::read_only(chain.dao(), chain.clone());

    assert_eq!(gateway.list_proposal_ids().await.unwrap(), vec![3, 1]);
}

#[tokio::test]
async fn read_errors_surface_as_read_failed() {
    let chain = MockChain::new(addr(0xda));
    chain.fail_id_list(true);
    let gateway = ContractGateway::read_only(chain.dao(), chain.clone());

    match gateway.list_proposal_ids().await.unwrap_err() {
        GovernanceError::ReadFailed(cause) => assert!(cause.contains("id list unavailable")),
        other => panic!("expected ReadFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn invalid_choice_never_reaches_the_network() {
    let chain = MockChain::new(addr(0xda));
    chain.seed(proposal(1, addr(1)));
    let gateway = signing_gateway(&chain, addr(2));

    for bad in [0u8, 4, 200] {
        assert_eq!(
            gateway.vote_raw(1, bad).await.unwrap_err(),
            GovernanceError::InvalidChoice(bad)
        );
    }
    assert_eq!(chain.write_calls(), 0);
}

#[tokio::test]
async fn writes_without_signer_fail_before_submission() {
    let chain = MockChain::new(addr(0xda));
    let gateway = ContractGateway::read_only(chain.dao(), chain.clone());

    assert_eq!(
        gateway.create_proposal("ipfs://x").await.unwrap_err(),
        GovernanceError::NoSigner
    );
    assert_eq!(
        gateway.vote(1, VoteChoice::Yes).await.unwrap_err(),
        GovernanceError::NoSigner
    );
    assert_eq!(chain.write_calls(), 0);
}

#[tokio::test]
async fn submission_rejection_is_typed() {
    let chain = MockChain::new(addr(0xda));
    chain.seed(proposal(1, addr(1)));
    chain.reject_next_write("insufficient funds for gas");
    let gateway = signing_gateway(&chain, addr(2));

    match gateway.vote(1, VoteChoice::Yes).await.unwrap_err() {
        GovernanceError::SubmissionRejected(cause) => {
            assert!(cause.contains("insufficient funds"))
        }
        other => panic!("expected SubmissionRejected, got {other:?}"),
    }
}

#[tokio::test]
async fn submitted_handle_starts_pending() {
    let chain = MockChain::new(addr(0xda));
    chain.seed(proposal(1, addr(1)));
    let gateway = signing_gateway(&chain, addr(2));

    let handle = gateway.vote(1, VoteChoice::Abstain).await.unwrap();
    assert_eq!(handle.state(), TxState::Pending);
    assert_eq!(chain.write_calls(), 1);
}

#[tokio::test]
async fn gateway_reads_need_no_signer() {
    let chain = MockChain::new(addr(0xda));
    chain.seed(proposal(5, addr(9)));
    let gateway = ContractGateway::read_only(chain.dao(), chain.clone());

    let fetched = gateway.get_proposal(5).await.unwrap();
    assert_eq!(fetched.id, 5);
    assert_eq!(fetched.proposer, addr(9));
}

// Keeps the provider wiring honest: the signer handed out for an account
// reports that same account.
#[tokio::test]
async fn provider_signer_keeps_identity() {
    let chain = MockChain::new(addr(0xda));
    let provider = MockWalletProvider::new(chain, vec![addr(4)]);
    use crate::wallet::WalletProvider;
    let signer = provider.signing_caller(&addr(4));
    assert_eq!(signer.account(), addr(4));
}
