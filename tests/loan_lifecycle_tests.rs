use ledgerbank::application::Bank;
use ledgerbank::config::EngineConfig;
use ledgerbank::domain::amortization::RepaymentPolicy;
use ledgerbank::domain::identity::Caller;
use ledgerbank::domain::loan::{LoanStatus, PaymentType};
use ledgerbank::domain::scheme::SchemeStatus;
use ledgerbank::error::{BankError, Entity};
use ledgerbank::infrastructure::in_memory::in_memory_stores;
use rust_decimal_macros::dec;
use std::sync::Arc;

mod common;
use common::{admin, open, scheme};

#[tokio::test]
async fn test_flat_loan_paid_off_in_twelve_installments() {
    let bank = common::bank();
    let (_, customer) = open(&bank, "c@example.com", dec!(10)).await;
    let home = scheme(&bank, "Home", dec!(8), dec!(500000)).await;

    let loan = bank
        .loans
        .apply(&customer, home.id, dec!(100000), 12)
        .await
        .unwrap();
    assert_eq!(loan.status, LoanStatus::Pending);
    assert_eq!(loan.policy, RepaymentPolicy::Flat);

    let approved = bank.loans.approve(&admin(), loan.id, None).await.unwrap();
    assert_eq!(approved.status, LoanStatus::Approved);
    assert_eq!(approved.emi_amount, Some(dec!(9000.00)));
    assert_eq!(approved.total_amount, Some(dec!(108000.00)));

    for n in 1..=12u32 {
        let receipt = if n % 2 == 0 {
            bank.loans.pay_advance(&customer, loan.id).await.unwrap()
        } else {
            bank.loans.pay_emi(&customer, loan.id).await.unwrap()
        };
        assert_eq!(receipt.loan.remaining_months, Some(12 - n));
        assert_eq!(receipt.record.amount_paid, dec!(9000.00));
        let expected = if n == 12 {
            LoanStatus::Completed
        } else {
            LoanStatus::Ongoing
        };
        assert_eq!(receipt.loan.status, expected);
    }

    assert!(matches!(
        bank.loans.pay_emi(&customer, loan.id).await,
        Err(BankError::NotActive)
    ));
    let records = bank.loans.payment_history(&customer, loan.id).await.unwrap();
    assert_eq!(records.len(), 12);
    assert_eq!(
        records
            .iter()
            .filter(|r| r.payment_type == PaymentType::Advance)
            .count(),
        6
    );
    assert!(bank.loans.list_active(&customer).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_decisions_are_final() {
    let bank = common::bank();
    let (_, customer) = open(&bank, "c@example.com", dec!(10)).await;
    let car = scheme(&bank, "Car", dec!(9), dec!(20000)).await;

    let approved = bank.loans.apply(&customer, car.id, dec!(5000), 6).await.unwrap();
    let first = bank.loans.approve(&admin(), approved.id, None).await.unwrap();
    assert!(matches!(
        bank.loans.approve(&admin(), approved.id, Some(dec!(1))).await,
        Err(BankError::AlreadyApproved)
    ));
    assert!(matches!(
        bank.loans.reject(&admin(), approved.id).await,
        Err(BankError::AlreadyApproved)
    ));
    let mine = bank.loans.list_mine(&customer).await.unwrap();
    assert_eq!(mine[0].emi_amount, first.emi_amount.unwrap());
    assert_eq!(mine[0].interest_rate, Some(dec!(9)));

    let rejected = bank.loans.apply(&customer, car.id, dec!(5000), 6).await.unwrap();
    bank.loans.reject(&admin(), rejected.id).await.unwrap();
    assert!(matches!(
        bank.loans.approve(&admin(), rejected.id, None).await,
        Err(BankError::AlreadyRejected)
    ));
    assert!(matches!(
        bank.loans.pay_emi(&customer, rejected.id).await,
        Err(BankError::NotActive)
    ));
}

#[tokio::test]
async fn test_application_validation() {
    let bank = common::bank();
    let (_, customer) = open(&bank, "c@example.com", dec!(10)).await;
    let car = scheme(&bank, "Car", dec!(9), dec!(20000)).await;

    assert!(matches!(
        bank.loans.apply(&customer, car.id, dec!(20000.01), 6).await,
        Err(BankError::ExceedsMaxAmount(_))
    ));
    assert!(matches!(
        bank.loans.apply(&customer, car.id, dec!(100), 0).await,
        Err(BankError::InvalidTenure)
    ));
    assert!(matches!(
        bank.loans.apply(&customer, car.id, dec!(0), 6).await,
        Err(BankError::InvalidAmount)
    ));

    bank.schemes
        .set_status(&admin(), car.id, SchemeStatus::Inactive)
        .await
        .unwrap();
    assert!(matches!(
        bank.loans.apply(&customer, car.id, dec!(100), 6).await,
        Err(BankError::SchemeInactive)
    ));
    assert!(bank.loans.list_mine(&customer).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_frozen_terms_survive_scheme_changes() {
    let bank = common::bank();
    let (_, customer) = open(&bank, "c@example.com", dec!(10)).await;
    let car = scheme(&bank, "Car", dec!(9), dec!(20000)).await;
    let loan = bank.loans.apply(&customer, car.id, dec!(7000), 10).await.unwrap();

    bank.schemes
        .set_status(&admin(), car.id, SchemeStatus::Inactive)
        .await
        .unwrap();
    let approved = bank.loans.approve(&admin(), loan.id, None).await.unwrap();
    assert_eq!(approved.interest_rate, Some(dec!(9)));
    // 7000 * 9 * 10 / 1200 = 525 interest, flat over 10 months
    assert_eq!(approved.total_amount, Some(dec!(7525.00)));
    assert_eq!(approved.emi_amount, Some(dec!(752.50)));
}

#[tokio::test]
async fn test_only_the_owner_may_pay() {
    let bank = common::bank();
    let (_, owner) = open(&bank, "owner@example.com", dec!(10)).await;
    let (_, other) = open(&bank, "other@example.com", dec!(10)).await;
    let car = scheme(&bank, "Car", dec!(9), dec!(20000)).await;
    let loan = bank.loans.apply(&owner, car.id, dec!(1000), 2).await.unwrap();
    bank.loans.approve(&admin(), loan.id, None).await.unwrap();

    assert!(matches!(
        bank.loans.pay_emi(&other, loan.id).await,
        Err(BankError::Forbidden)
    ));
    assert!(matches!(
        bank.loans.payment_history(&other, loan.id).await,
        Err(BankError::Forbidden)
    ));
    assert!(matches!(
        bank.loans
            .pay_emi(&Caller::new(ledgerbank::domain::account::AccountId::generate()), loan.id)
            .await,
        Err(BankError::Forbidden)
    ));
    assert_eq!(bank.loans.list_active(&owner).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_personalized_loan_rate_resolution() {
    let bank = common::bank();
    let (_, customer) = open(&bank, "c@example.com", dec!(10)).await;
    let loan = bank
        .loans
        .apply_custom(&customer, "Wedding", dec!(10000), 7, None)
        .await
        .unwrap();

    assert!(matches!(
        bank.loans.approve(&admin(), loan.id, None).await,
        Err(BankError::TermsRequired)
    ));
    let approved = bank
        .loans
        .approve(&admin(), loan.id, Some(dec!(10)))
        .await
        .unwrap();
    assert_eq!(approved.interest_rate, Some(dec!(10)));
    assert_eq!(approved.emi_amount, Some(dec!(1511.90)));

    let configured = Bank::new(
        in_memory_stores(),
        EngineConfig {
            custom_loan_rate: Some(dec!(12)),
            approval_policy: RepaymentPolicy::ReducingBalance,
            ..EngineConfig::default()
        },
    );
    let (_, customer) = open(&configured, "c@example.com", dec!(10)).await;
    let loan = configured
        .loans
        .apply_custom(&customer, "Laptop", dec!(50000), 24, None)
        .await
        .unwrap();
    let approved = configured.loans.approve(&admin(), loan.id, None).await.unwrap();
    assert_eq!(approved.policy, RepaymentPolicy::ReducingBalance);
    assert_eq!(approved.interest_rate, Some(dec!(12)));
}

#[tokio::test]
async fn test_estimate_uses_reducing_balance() {
    let bank = common::bank();
    let home = scheme(&bank, "Home", dec!(8), dec!(500000)).await;
    let estimate = bank.loans.estimate(home.id, dec!(100000), 12).await.unwrap();
    assert_eq!(estimate.emi, dec!(8698.84));
    assert_eq!(estimate.total_payable, dec!(104386.08));

    let custom = bank.loans.estimate_at_rate(dec!(10), dec!(50000), 24).unwrap();
    assert_eq!(custom.emi, dec!(2307.25));
    assert!(matches!(
        bank.loans.estimate_at_rate(dec!(-1), dec!(50000), 24),
        Err(BankError::InvalidRate)
    ));
    assert!(matches!(
        bank.loans.estimate_at_rate(dec!(10), dec!(50000), 0),
        Err(BankError::InvalidTenure)
    ));

    assert!(matches!(
        bank.loans
            .estimate(ledgerbank::domain::scheme::SchemeId(uuid::Uuid::new_v4()), dec!(1), 1)
            .await,
        Err(BankError::NotFound(Entity::Scheme))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_payments_never_overshoot() {
    let bank = Arc::new(Bank::new(
        in_memory_stores(),
        EngineConfig {
            max_attempts: 1_000,
            ..EngineConfig::default()
        },
    ));
    let (_, customer) = open(&bank, "c@example.com", dec!(10)).await;
    let car = scheme(&bank, "Car", dec!(9), dec!(20000)).await;
    let loan = bank.loans.apply(&customer, car.id, dec!(1200), 5).await.unwrap();
    bank.loans.approve(&admin(), loan.id, None).await.unwrap();
    let loan_id = loan.id;

    let mut handles = Vec::new();
    for _ in 0..20 {
        let bank = bank.clone();
        handles.push(tokio::spawn(async move {
            bank.loans.pay_emi(&customer, loan_id).await
        }));
    }
    let mut paid = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => paid += 1,
            Err(BankError::NotActive) | Err(BankError::AlreadyPaidOff) | Err(BankError::StoreConflict) => {}
            Err(e) => panic!("unexpected payment error: {e}"),
        }
    }

    assert_eq!(paid, 5);
    let records = bank.loans.payment_history(&customer, loan_id).await.unwrap();
    assert_eq!(records.len(), 5);
    let summary = &bank.loans.list_mine(&customer).await.unwrap()[0];
    assert_eq!(summary.status, LoanStatus::Completed);
    assert_eq!(summary.remaining_months, 0);
}
